use mdi_engine::engine::config::DEFAULT_OPTG_BOOTSTRAP_ITERATIONS;

pub struct DefaultsConfig {
    pub hostname: String,
    pub port: u16,
    pub ranks: usize,
    pub optg_bootstrap_iterations: usize,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            hostname: "localhost".to_string(),
            port: 8021,
            ranks: 1,
            optg_bootstrap_iterations: DEFAULT_OPTG_BOOTSTRAP_ITERATIONS,
        }
    }
}
