use std::sync::LazyLock;

static LONG_VERSION: LazyLock<String> = LazyLock::new(|| {
    format!(
        "{}\ncommit:  {}\nbuilt:   {}\nlibqdm2: {}",
        env!("CARGO_PKG_VERSION"),
        option_env!("VERGEN_GIT_DESCRIBE").unwrap_or("unknown"),
        option_env!("BUILD_TIMESTAMP").unwrap_or("unknown"),
        option_env!("QDM2_VERSION").unwrap_or("unknown"),
    )
});

/// Text for `--version`: package version, git describe, build time and
/// library version.
pub fn long_version() -> &'static str {
    LONG_VERSION.as_str()
}

#[test]
fn starts_with_package_version() {
    assert!(long_version().starts_with(env!("CARGO_PKG_VERSION")));
    assert_eq!(long_version().lines().count(), 4);
}
