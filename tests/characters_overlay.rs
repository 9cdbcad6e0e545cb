//! Exercises the `characters.toml` overlay path end to end: writing a file
//! under an overridden `NARRATOR_CONFIG_DIR` and loading it through
//! `CharacterRegistry::with_overlay`, the same way `bin/bridge.rs` does at
//! startup.

use narrator_bridge::characters::CharacterRegistry;
use narrator_bridge::narrator_dirs;

#[test]
fn overlay_file_under_config_dir_is_loaded_and_replaces_builtin() {
    let dir = tempfile::tempdir().unwrap();

    // SAFETY: this test does not run concurrently with others that read
    // NARRATOR_CONFIG_DIR in this process.
    unsafe { std::env::set_var("NARRATOR_CONFIG_DIR", dir.path()) };

    let overlay_path = narrator_dirs::characters_file();
    std::fs::write(
        &overlay_path,
        r#"
        [[character]]
        id = "reluctant_developer"
        human_name = "Custom Voice"
        tts_style_instructions = "calm"
        llm_system_prompt_modifier = "calm prompt"
        "#,
    )
    .unwrap();

    let loaded = std::fs::read_to_string(&overlay_path).unwrap();
    let registry = CharacterRegistry::with_overlay(&loaded);
    let character = registry.get("reluctant_developer").expect("builtin id still present");
    assert_eq!(character.human_name, "Custom Voice");

    unsafe { std::env::remove_var("NARRATOR_CONFIG_DIR") };
}
