//! Build script for the storefront crate.
//!
//! Fingerprints `static/css/main.css` so pages can link it under an
//! immutable, content-addressed name.

use std::env;
use std::fs;
use std::path::Path;

use sha2::{Digest, Sha256};

/// Hex digits of the SHA-256 kept in the file name.
const HASH_LEN: usize = 10;

fn main() {
    let Ok(manifest_dir) = env::var("CARGO_MANIFEST_DIR") else {
        println!("cargo:warning=CARGO_MANIFEST_DIR is not set; skipping CSS fingerprint");
        println!("cargo:rustc-env=CSS_HASH=dev");
        return;
    };
    let static_dir = Path::new(&manifest_dir).join("static/css");
    let source = static_dir.join("main.css");
    println!("cargo:rerun-if-changed={}", source.display());

    let content = match fs::read(&source) {
        Ok(content) => content,
        Err(e) => {
            println!("cargo:warning=Could not read main.css: {e}");
            println!("cargo:rustc-env=CSS_HASH=dev");
            return;
        }
    };

    let digest = format!("{:x}", Sha256::digest(&content));
    let hash = &digest[..HASH_LEN];
    println!("cargo:rustc-env=CSS_HASH={hash}");

    let derived = static_dir.join("derived");
    let target = derived.join(format!("main.{hash}.css"));
    if target.exists() {
        return;
    }
    if let Err(e) = fs::create_dir_all(&derived).and_then(|()| fs::write(&target, &content)) {
        println!("cargo:warning=Could not write {}: {e}", target.display());
    }
}
