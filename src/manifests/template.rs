// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `$name` / `${name}` placeholder substitution for the Corefile.
//!
//! `$$` collapses to a literal `$`. Placeholders with no value, and `$`
//! sequences that are not valid placeholders, are copied through verbatim.

use std::collections::BTreeMap;

fn is_ident_start(c: char) -> bool {
    c == '_' || c.is_ascii_alphabetic()
}

fn is_ident_continue(c: char) -> bool {
    c == '_' || c.is_ascii_alphanumeric()
}

/// Substitute placeholders in `template` from `values`.
#[must_use]
pub fn safe_substitute(template: &str, values: &BTreeMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        if let Some(tail) = after.strip_prefix('$') {
            out.push('$');
            rest = tail;
            continue;
        }

        if let Some(braced) = after.strip_prefix('{') {
            if let Some(end) = braced.find('}') {
                let name = &braced[..end];
                let valid = name.starts_with(is_ident_start) && name.chars().all(is_ident_continue);
                if valid {
                    if let Some(value) = values.get(name) {
                        out.push_str(value);
                        rest = &braced[end + 1..];
                        continue;
                    }
                }
            }
            out.push('$');
            rest = after;
            continue;
        }

        let len = if after.starts_with(is_ident_start) {
            after
                .find(|c: char| !is_ident_continue(c))
                .unwrap_or(after.len())
        } else {
            0
        };
        match values.get(&after[..len]).filter(|_| len > 0) {
            Some(value) => {
                out.push_str(value);
                rest = &after[len..];
            }
            None => {
                out.push('$');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}
