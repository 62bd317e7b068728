//! Default configuration values

/// Default project configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "disperse.toml";

/// Hidden alternative
pub const ALT_CONFIG_FILE: &str = ".disperse.toml";

/// Directory under the platform config dir holding the operator config
pub const USER_CONFIG_DIR: &str = "disperse";

/// Get list of project config file names to search for
pub fn config_file_names() -> Vec<&'static str> {
    vec![DEFAULT_CONFIG_FILE, ALT_CONFIG_FILE]
}

/// Starter configuration written by `disperse init`
pub fn default_config_toml(name: &str, tag_name: &str, news_file: Option<&str>) -> String {
    let mut out = String::from("# disperse release configuration\n\n");
    out.push_str(&format!("name = \"{name}\"\n"));
    out.push_str(&format!("tag-name = \"{tag_name}\"\n"));
    if let Some(news) = news_file {
        out.push_str(&format!("news-file = \"{news}\"\n"));
    }
    out.push_str(DEFAULT_CONFIG_TEMPLATE);
    out
}

/// Commented-out options appended to generated configuration
pub const DEFAULT_CONFIG_TEMPLATE: &str = r#"
# Command that must succeed before publishing
# verify-command = "cargo test --all"

# Minimum number of days without commits before an unattended release
# timeout-days = 5

# Seconds to wait for CI to report a result
# ci-timeout = 7200

# Destinations the built source tarballs are copied to with scp
# tarball-location = ["example.com:/srv/releases"]

# skip-twine-upload = false
# skip-crates-publish = false

# [[update-version]]
# path = "src/version.py"
# new-line = "__version__ = $TUPLED_VERSION"

# [github]
# url = "https://github.com/owner/repo"
# branch = "main"

# [launchpad]
# project = "project"
"#;
