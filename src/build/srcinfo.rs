// src/build/srcinfo.rs

//! Version extraction from `makepkg --printsrcinfo` output

use crate::error::{Error, Result};

/// Effective `[epoch:]pkgver-pkgrel` of a recipe
///
/// Only the first value of each key counts; `pkgver`, `pkgrel` and `epoch`
/// live in the `pkgbase` block, which comes first.
pub fn srcinfo_version(text: &str) -> Result<String> {
    let mut pkgver = None;
    let mut pkgrel = None;
    let mut epoch = None;

    for line in text.lines() {
        let Some((key, value)) = line.trim().split_once('=') else {
            continue;
        };
        let slot = match key.trim() {
            "pkgver" => &mut pkgver,
            "pkgrel" => &mut pkgrel,
            "epoch" => &mut epoch,
            _ => continue,
        };
        if slot.is_none() {
            *slot = Some(value.trim().to_string());
        }
    }

    let pkgver = pkgver.ok_or_else(|| Error::ParseError("no pkgver in .SRCINFO".to_string()))?;
    let pkgrel = pkgrel.ok_or_else(|| Error::ParseError("no pkgrel in .SRCINFO".to_string()))?;
    Ok(match epoch.filter(|e| !e.is_empty() && e != "0") {
        Some(epoch) => format!("{}:{}-{}", epoch, pkgver, pkgrel),
        None => format!("{}-{}", pkgver, pkgrel),
    })
}
