//! Configuration precedence: defaults, global file, explicit file, environment.

use super::support::with_xdg_env;
use coldset::config::{xdg, ConfigLoader};
use coldset::store::RestoreTier;
use coldset::types::MIB;
use std::fs;
use tempfile::TempDir;

#[test]
fn layers_apply_in_precedence_order() {
    let temp = TempDir::new().unwrap();
    with_xdg_env(&temp, || {
        let global = xdg::global_config_path().unwrap();
        fs::create_dir_all(global.parent().unwrap()).unwrap();
        fs::write(
            &global,
            "[snapshot]\nlabel = \"global\"\n\n[sets]\nupload_limit_mb = 8\n\n[restore]\ntier = \"bulk\"\n",
        )
        .unwrap();

        let explicit = temp.path().join("run.toml");
        fs::write(&explicit, "[snapshot]\nlabel = \"explicit\"\n").unwrap();

        std::env::set_var("COLDSET__PIPELINE__RETRY_ATTEMPTS", "7");
        let loaded = ConfigLoader::load(Some(&explicit));
        std::env::remove_var("COLDSET__PIPELINE__RETRY_ATTEMPTS");
        let config = loaded.unwrap();

        assert_eq!(config.snapshot.label.as_deref(), Some("explicit"));
        assert_eq!(config.sets.upload_limit(), 8 * MIB);
        assert_eq!(config.restore.tier, RestoreTier::Bulk);
        assert_eq!(config.pipeline.retry_attempts, 7);
        assert_eq!(config.restore.queue_depth, 4);
    });
}

#[test]
fn state_file_defaults_below_data_home() {
    let temp = TempDir::new().unwrap();
    with_xdg_env(&temp, || {
        let config = ConfigLoader::load(None).unwrap();
        assert_eq!(
            config.sets.state_file_path().unwrap(),
            temp.path().join("data/coldset/tree.bin")
        );
    });
}

#[test]
fn invalid_environment_value_is_rejected() {
    let temp = TempDir::new().unwrap();
    with_xdg_env(&temp, || {
        std::env::set_var("COLDSET__RESTORE__QUEUE_DEPTH", "0");
        let loaded = ConfigLoader::load(None);
        std::env::remove_var("COLDSET__RESTORE__QUEUE_DEPTH");
        assert!(loaded.is_err());
    });
}
