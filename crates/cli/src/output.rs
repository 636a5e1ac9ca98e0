// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! User-facing listings. Color is decided once by the caller and passed in.

const GREEN: &str = "\x1b[32m";
const RESET: &str = "\x1b[0m";

/// Escape sequences used to highlight matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub highlight: &'static str,
    pub reset: &'static str,
}

impl Palette {
    pub fn new(color: bool) -> Self {
        if color {
            Self { highlight: GREEN, reset: RESET }
        } else {
            Self::plain()
        }
    }

    pub fn plain() -> Self {
        Self { highlight: "", reset: "" }
    }
}

/// Whether to color output: off with `--no-color`, a non-empty `NO_COLOR`,
/// or on Windows consoles.
pub fn color_enabled(no_color_flag: bool, no_color_env: Option<&str>) -> bool {
    !no_color_flag && no_color_env.is_none_or(str::is_empty) && !cfg!(windows)
}

/// Header printed above the role listing.
pub fn listing_header(choice_given: bool) -> &'static str {
    if choice_given {
        "available roles:"
    } else {
        "use one of the following roles:"
    }
}

/// One line per profile name; names in `matches` are marked and highlighted.
pub fn role_listing(available: &[String], matches: &[String], palette: &Palette) -> String {
    let mut out = String::new();
    for name in available {
        if matches.contains(name) {
            out.push_str(&format!("{}  ~>  {name}{}\n", palette.highlight, palette.reset));
        } else {
            out.push_str(&format!("      {name}\n"));
        }
    }
    out
}

/// The line announcing the selected profile.
pub fn selected_line(name: &str, via_nick: bool) -> String {
    if via_nick {
        format!("selected (via nicks): {name}")
    } else {
        format!("selected: {name}")
    }
}

#[cfg(test)]
#[path = "output_tests.rs"]
mod tests;
