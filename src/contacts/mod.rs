//! Contact-name resolution from the macOS AddressBook stores.
//!
//! Presentation only: labels in the chat picker and logs. The monitor
//! loop never consults contacts, and a machine without readable stores
//! just gets raw identifiers.

use glob::glob;
use rusqlite::{Connection, OpenFlags};
use std::collections::HashMap;
use std::path::Path;

use crate::utils::normalize::{normalize_email, normalize_phone};

const SOURCES_PATTERN: &str =
    "Library/Application Support/AddressBook/Sources/*/AddressBook-v22.abcddb";

pub struct ContactsBook {
    lookup: HashMap<String, String>,
}

impl ContactsBook {
    pub fn empty() -> Self {
        Self {
            lookup: HashMap::new(),
        }
    }

    /// Build the normalized identifier -> display name map. Best effort:
    /// unreadable or missing stores contribute nothing.
    pub fn load() -> Self {
        let mut lookup = HashMap::new();

        let Ok(home) = std::env::var("HOME") else {
            return Self { lookup };
        };
        let pattern = format!("{}/{}", home.trim_end_matches('/'), SOURCES_PATTERN);

        let Ok(paths) = glob(&pattern) else {
            return Self { lookup };
        };
        for path in paths.flatten() {
            if let Err(err) = load_store(&path, &mut lookup) {
                log::warn!("Could not read contacts store {}: {}", path.display(), err);
            }
        }

        log::info!("Loaded {} contact identifiers", lookup.len());
        Self { lookup }
    }

    pub fn is_empty(&self) -> bool {
        self.lookup.is_empty()
    }

    /// Resolve a raw phone/email identifier to a display name.
    pub fn resolve(&self, identifier: &str) -> Option<&str> {
        if let Some(phone) = normalize_phone(identifier) {
            if let Some(name) = self.lookup.get(&phone) {
                return Some(name);
            }
        }
        if let Some(email) = normalize_email(identifier) {
            if let Some(name) = self.lookup.get(&email) {
                return Some(name);
            }
        }
        None
    }

    /// Label for a chat row: display name when set, otherwise the
    /// identifier resolved through contacts.
    pub fn format_chat_label(&self, display_name: &str, identifier: &str) -> String {
        let display_name = display_name.trim();
        if !display_name.is_empty() {
            return display_name.to_string();
        }

        let identifier = identifier.trim();
        if let Some(phone) = normalize_phone(identifier) {
            if let Some(name) = self.lookup.get(&phone) {
                return format!("{} ({})", name, phone);
            }
        }
        if let Some(email) = normalize_email(identifier) {
            if let Some(name) = self.lookup.get(&email) {
                return format!("{} ({})", name, email);
            }
        }

        if identifier.is_empty() {
            "(Unknown)".to_string()
        } else {
            identifier.to_string()
        }
    }

    #[cfg(test)]
    fn with_entries(entries: &[(&str, &str)]) -> Self {
        Self {
            lookup: entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

fn load_store(path: &Path, lookup: &mut HashMap<String, String>) -> Result<(), rusqlite::Error> {
    let conn = Connection::open_with_flags(
        format!("file:{}?mode=ro", path.display()),
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_URI,
    )?;

    let mut names: HashMap<i64, String> = HashMap::new();
    {
        let mut stmt =
            conn.prepare("SELECT Z_PK, ZFIRSTNAME, ZLASTNAME, ZNICKNAME FROM ZABCDRECORD")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, Option<String>>(3)?,
            ))
        })?;
        for row in rows {
            let (pk, first, last, nick) = row?;
            let name = full_name(first.as_deref(), last.as_deref(), nick.as_deref());
            names.insert(pk, name);
        }
    }

    {
        let mut stmt = conn.prepare("SELECT ZOWNER, ZFULLNUMBER FROM ZABCDPHONENUMBER")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, Option<String>>(1)?))
        })?;
        for row in rows {
            let (owner, number) = row?;
            let Some(number) = number else { continue };
            if let (Some(norm), Some(name)) = (normalize_phone(&number), names.get(&owner)) {
                lookup.entry(norm).or_insert_with(|| name.clone());
            }
        }
    }

    {
        let mut stmt = conn.prepare("SELECT ZOWNER, ZADDRESS FROM ZABCDEMAILADDRESS")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, Option<String>>(1)?))
        })?;
        for row in rows {
            let (owner, address) = row?;
            let Some(address) = address else { continue };
            if let (Some(norm), Some(name)) = (normalize_email(&address), names.get(&owner)) {
                lookup.entry(norm).or_insert_with(|| name.clone());
            }
        }
    }

    Ok(())
}

fn full_name(first: Option<&str>, last: Option<&str>, nick: Option<&str>) -> String {
    let first = first.unwrap_or("").trim();
    let last = last.unwrap_or("").trim();
    let name = format!("{} {}", first, last).trim().to_string();
    if !name.is_empty() {
        return name;
    }
    let nick = nick.unwrap_or("").trim();
    if !nick.is_empty() {
        return nick.to_string();
    }
    "(No Name)".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_name_fallbacks() {
        assert_eq!(full_name(Some("Alice"), Some("Smith"), None), "Alice Smith");
        assert_eq!(full_name(Some("Alice"), None, None), "Alice");
        assert_eq!(full_name(None, None, Some("Al")), "Al");
        assert_eq!(full_name(None, None, None), "(No Name)");
    }

    #[test]
    fn test_resolve_normalizes_identifiers() {
        let book = ContactsBook::with_entries(&[
            ("+19095551234", "Alice Smith"),
            ("bob@example.com", "Bob Jones"),
        ]);
        assert_eq!(book.resolve("(909) 555-1234"), Some("Alice Smith"));
        assert_eq!(book.resolve("BOB@Example.com"), Some("Bob Jones"));
        assert_eq!(book.resolve("+15550000000"), None);
    }

    #[test]
    fn test_chat_label() {
        let book = ContactsBook::with_entries(&[("+19095551234", "Alice Smith")]);
        assert_eq!(book.format_chat_label("Family", "chat123"), "Family");
        assert_eq!(
            book.format_chat_label("", "909-555-1234"),
            "Alice Smith (+19095551234)"
        );
        assert_eq!(
            book.format_chat_label("", "stranger@example.com"),
            "stranger@example.com"
        );
        assert_eq!(book.format_chat_label("", ""), "(Unknown)");
    }
}
