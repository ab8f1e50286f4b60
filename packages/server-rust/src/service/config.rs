/// Registry-level configuration for service registration and method lookup.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Separator between service and method in a dispatch name.
    pub separator: char,
    /// Apply the exported-name rule to explicit service names as well as
    /// derived ones. Off by default: explicit names are taken as given.
    pub strict_service_names: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            separator: '.',
            strict_service_names: false,
        }
    }
}
