//! Platform naming.
//!
//! Release trees are keyed by a free-form `<os>-<arch>` string. The wire
//! format predates this crate and uses Go toolchain names, so the host
//! triple is mapped accordingly (`macos` -> `darwin`, `x86_64` -> `amd64`,
//! `aarch64` -> `arm64`).

/// The platform string of the compile target, e.g. `linux-amd64`.
///
/// The updater pins this at build time; it never consults the environment.
pub fn native() -> String {
    format!("{}-{}", go_os(std::env::consts::OS), go_arch(std::env::consts::ARCH))
}

/// Builder-side default: `GOOS`/`GOARCH` when both are set, else [`native`].
pub fn default_for_builder() -> String {
    match (std::env::var("GOOS"), std::env::var("GOARCH")) {
        (Ok(os), Ok(arch)) if !os.is_empty() && !arch.is_empty() => format!("{os}-{arch}"),
        _ => native(),
    }
}

fn go_os(os: &str) -> &str {
    match os {
        "macos" => "darwin",
        other => other,
    }
}

fn go_arch(arch: &str) -> &str {
    match arch {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "x86" => "386",
        other => other,
    }
}
