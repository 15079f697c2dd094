// Integration tests for the gaffer-app scaffold: default files and layout.

use std::path::Path;

use gaffer_app::state::SquadState;

/// Verify that defaults/strategy.toml is valid TOML.
#[test]
fn strategy_toml_is_valid() {
    let content = std::fs::read_to_string("defaults/strategy.toml")
        .expect("defaults/strategy.toml should exist");
    let parsed: Result<toml::Value, _> = toml::from_str(&content);
    assert!(parsed.is_ok(), "defaults/strategy.toml is not valid TOML: {:?}", parsed.err());
}

/// Verify that defaults/squad.toml parses into an empty squad state.
#[test]
fn squad_toml_is_valid_and_empty() {
    let content =
        std::fs::read_to_string("defaults/squad.toml").expect("defaults/squad.toml should exist");
    let state: SquadState = toml::from_str(&content).expect("defaults/squad.toml should parse");
    assert!(state.is_empty());
    assert_eq!(state.free_transfers, 1);
    assert!(state.chips_available.wildcard);
    assert!(state.purchase_price_map().unwrap().is_empty());
}

/// Verify that all expected source files exist.
#[test]
fn source_files_exist() {
    let expected_files = [
        "src/main.rs",
        "src/lib.rs",
        "src/config.rs",
        "src/data.rs",
        "src/pipeline.rs",
        "src/state.rs",
        "src/summary.rs",
        "tests/fixtures/predictions.csv",
        "tests/fixtures/fixtures.csv",
    ];
    for file in expected_files {
        assert!(Path::new(file).is_file(), "Expected file '{}' to exist", file);
    }
}
