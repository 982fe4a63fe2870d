//! Config section merge
//!
//! Splices one named section of an incoming config document into a resident
//! document. A section starts at a header line (`[name]` at the start of the
//! line, name made of ASCII letters, digits and `_`) and runs until the next
//! header line or the end of the document.
//!
//! The result is the new section followed by the resident document with every
//! copy of the old section removed. All other lines keep their bytes and
//! their relative order.

/// Result of a merge attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Full text of the new resident document
    Merged(String),
    /// Incoming document has no such section; the resident must stay as is
    SectionMissing,
}

/// Scanner position relative to the section being removed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    /// No target header seen yet
    Before,
    /// Inside a target section, lines are dropped
    InTarget,
    /// Past a target section, lines pass through
    After,
}

/// Name of the section a header line opens, if the line is a header
pub fn section_header(line: &str) -> Option<&str> {
    let rest = line.strip_prefix('[')?;
    let end = rest.find(']')?;
    let name = &rest[..end];

    let valid = !name.is_empty() && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_');
    valid.then_some(name)
}

/// Header line plus body of the first `name` section in `document`.
/// Returns an empty string when the section is absent.
pub fn extract_section(document: &str, name: &str) -> String {
    let mut out = String::new();
    let mut inside = false;

    for line in document.split_inclusive('\n') {
        match section_header(line) {
            Some(_) if inside => break,
            Some(header) if header == name => {
                inside = true;
                out.push_str(line);
            }
            _ if inside => out.push_str(line),
            _ => {}
        }
    }

    out
}

/// `document` with every `name` section (header and body) removed
pub fn remove_section(document: &str, name: &str) -> String {
    let mut out = String::with_capacity(document.len());
    let mut state = ScanState::Before;

    for line in document.split_inclusive('\n') {
        let header = section_header(line);

        state = match (state, header) {
            (_, Some(h)) if h == name => ScanState::InTarget,
            (ScanState::InTarget, Some(_)) => ScanState::After,
            (other, _) => other,
        };

        if state != ScanState::InTarget {
            out.push_str(line);
        }
    }

    out
}

/// Replace section `name` of `resident` with the one found in `incoming`.
/// A newline is appended only when the new section lacks one; trailing blank lines are kept.
pub fn merge_section(incoming: &str, resident: &str, name: &str) -> MergeOutcome {
    let mut section = extract_section(incoming, name);
    if section.is_empty() {
        return MergeOutcome::SectionMissing;
    }
    if !section.ends_with('\n') {
        section.push('\n');
    }

    section.push_str(&remove_section(resident, name));
    MergeOutcome::Merged(section)
}
