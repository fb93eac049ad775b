use std::env;

fn main() {
    // Get the target triple
    let target = env::var("TARGET").unwrap_or_else(|_| "unknown".to_string());
    println!("cargo:rustc-env=REMOCLIP_TARGET={}", target);

    // Get the build date
    let build_date = chrono::Utc::now().format("%Y-%m-%d").to_string();
    println!("cargo:rustc-env=REMOCLIP_BUILD_DATE={}", build_date);

    println!("cargo:rerun-if-changed=build.rs");
}
