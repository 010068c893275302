//! Build script — stamps BUILD_DATETIME into the version banner.
//!
//! The calendar math lives in src/datetime.rs, shared with the library
//! manifest writer (build scripts cannot link against the library crate,
//! so it is pulled in textually).

include!("src/datetime.rs");

fn main() {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let (year, month, day, hours, minutes, _seconds) = civil_from_unix(now);
    println!(
        "cargo:rustc-env=BUILD_DATETIME={:04}-{:02}-{:02} {:02}:{:02} UTC",
        year, month, day, hours, minutes
    );

    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=src/datetime.rs");
}
