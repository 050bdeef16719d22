use super::defaults::DefaultsConfig;
use super::file::FileConfig;
use super::models::AppConfig;
use crate::cli::RunArgs;
use crate::error::{CliError, Result};
use mdi_engine::core::protocol::SchemaPolicy;
use mdi_engine::engine::config::EngineConfig;

/// Merges defaults, the optional configuration file, and command-line overrides,
/// in increasing order of precedence.
pub fn build_config(args: &RunArgs) -> Result<AppConfig> {
    let file_config = if let Some(config_path) = &args.config {
        FileConfig::from_file(config_path)?
    } else {
        FileConfig::default()
    };
    merge(args, file_config)
}

fn merge(args: &RunArgs, mut file_config: FileConfig) -> Result<AppConfig> {
    let defaults = DefaultsConfig::default();
    let driver_file = file_config.driver.take().unwrap_or_default();
    let engine_file = file_config.engine.take().unwrap_or_default();

    let hostname = args
        .hostname
        .clone()
        .or(driver_file.hostname)
        .unwrap_or(defaults.hostname);
    let port = args.port.or(driver_file.port).unwrap_or(defaults.port);
    if port == 0 {
        return Err(CliError::Config(
            "`driver.port` must name the port the driver listens on.".to_string(),
        ));
    }

    let ranks = args.ranks.or(engine_file.ranks).unwrap_or(defaults.ranks);
    if ranks == 0 {
        return Err(CliError::Config(
            "`engine.ranks` must be at least 1.".to_string(),
        ));
    }

    let schema_policy = if args.permissive {
        SchemaPolicy::Permissive
    } else {
        engine_file.schema_policy.unwrap_or_default()
    };

    let mut builder = EngineConfig::builder()
        .schema_policy(schema_policy)
        .optg_bootstrap_iterations(
            engine_file
                .optg_bootstrap_iterations
                .unwrap_or(defaults.optg_bootstrap_iterations),
        );
    if let Some(tags) = engine_file.group {
        builder = builder.group_tags(tags);
    }
    let engine = builder
        .build()
        .map_err(|e| CliError::Config(e.to_string()))?;

    Ok(AppConfig {
        system_path: args.system.clone(),
        hostname,
        port,
        ranks,
        units: args.units.or(engine_file.units),
        engine,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdi_engine::core::models::atom::AtomTag;
    use mdi_engine::core::models::group::AtomGroup;
    use mdi_engine::core::units::UnitStyle;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::NamedTempFile;

    fn args() -> RunArgs {
        RunArgs {
            system: PathBuf::from("system.toml"),
            ..RunArgs::default()
        }
    }

    fn file(content: &str) -> FileConfig {
        FileConfig::from_toml_str(content).unwrap()
    }

    #[test]
    fn defaults_apply_without_file_or_overrides() {
        let config = merge(&args(), FileConfig::default()).unwrap();
        assert_eq!(config.hostname, "localhost");
        assert_eq!(config.port, 8021);
        assert_eq!(config.ranks, 1);
        assert_eq!(config.units, None);
        assert_eq!(config.engine, EngineConfig::default());
    }

    #[test]
    fn file_values_override_defaults() {
        let config = merge(
            &args(),
            file(
                r#"
                [driver]
                port = 9000
                [engine]
                ranks = 2
                units = "lj"
                group = [2]
                "#,
            ),
        )
        .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.ranks, 2);
        assert_eq!(config.units, Some(UnitStyle::Lj));
        assert!(config.engine.group.contains(AtomTag(2)));
        assert!(!config.engine.group.contains(AtomTag(1)));
    }

    #[test]
    fn command_line_overrides_file() {
        let mut cli = args();
        cli.port = Some(7000);
        cli.hostname = Some("10.0.0.2".to_string());
        cli.ranks = Some(4);
        cli.units = Some(UnitStyle::Metal);
        cli.permissive = true;

        let config = merge(
            &cli,
            file(
                r#"
                [driver]
                hostname = "driver.local"
                port = 9000
                [engine]
                ranks = 2
                units = "lj"
                schema-policy = "strict"
                "#,
            ),
        )
        .unwrap();
        assert_eq!(config.hostname, "10.0.0.2");
        assert_eq!(config.port, 7000);
        assert_eq!(config.ranks, 4);
        assert_eq!(config.units, Some(UnitStyle::Metal));
        assert_eq!(config.engine.schema_policy, SchemaPolicy::Permissive);
        assert_eq!(config.engine.group, AtomGroup::All);
    }

    #[test]
    fn zero_ranks_and_empty_group_are_rejected() {
        let mut cli = args();
        cli.ranks = Some(0);
        assert!(matches!(
            merge(&cli, FileConfig::default()),
            Err(CliError::Config(_))
        ));
        assert!(matches!(
            merge(&args(), file("[engine]\ngroup = []\n")),
            Err(CliError::Config(_))
        ));
    }

    #[test]
    fn config_file_is_read_from_disk() {
        let mut config_file = NamedTempFile::new().unwrap();
        writeln!(config_file, "[engine]\noptg-bootstrap-iterations = 3").unwrap();
        let mut cli = args();
        cli.config = Some(config_file.path().to_path_buf());

        let config = build_config(&cli).unwrap();
        assert_eq!(config.engine.optg_bootstrap_iterations, 3);
    }
}
