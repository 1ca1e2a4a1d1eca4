// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// QR payload serialisation. Scanner apps match on exact text layout: field
// order and prefixes follow WIFI, vCard 3.0 and iCalendar VEVENT.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use wandelwerk_core::error::{Result, WandelError};

/// Network authentication advertised in a WiFi payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WifiSecurity {
    #[default]
    #[serde(rename = "WPA")]
    Wpa,
    #[serde(rename = "WEP")]
    Wep,
    #[serde(rename = "nopass")]
    Open,
}

impl WifiSecurity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Wpa => "WPA",
            Self::Wep => "WEP",
            Self::Open => "nopass",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WifiNetwork {
    pub ssid: String,
    pub password: String,
    pub security: WifiSecurity,
    pub hidden: bool,
}

/// Contact card fields. Blank fields are left out of the card.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Contact {
    pub name: String,
    pub organization: String,
    pub phone: String,
    pub email: String,
    pub url: String,
    pub address: String,
}

/// Calendar entry. Dates are local `YYYY-MM-DDTHH:MM[:SS]` strings as
/// produced by datetime form inputs.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarEvent {
    pub title: String,
    pub location: String,
    pub start: String,
    pub end: String,
    pub description: String,
}

/// Everything a QR code can carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum QrPayload {
    Text {
        text: String,
    },
    Url {
        url: String,
    },
    Email {
        address: String,
        #[serde(default)]
        subject: String,
        #[serde(default)]
        body: String,
    },
    Phone {
        number: String,
    },
    Sms {
        number: String,
        #[serde(default)]
        message: String,
    },
    Wifi(WifiNetwork),
    Vcard(Contact),
    Event(CalendarEvent),
}

impl QrPayload {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Url { .. } => "url",
            Self::Email { .. } => "email",
            Self::Phone { .. } => "phone",
            Self::Sms { .. } => "sms",
            Self::Wifi(_) => "wifi",
            Self::Vcard(_) => "vcard",
            Self::Event(_) => "event",
        }
    }

    /// The exact string placed into the QR code.
    pub fn to_content(&self) -> Result<String> {
        let content = match self {
            Self::Text { text } => text.clone(),
            Self::Url { url } => url.trim().to_string(),
            Self::Email {
                address,
                subject,
                body,
            } => mailto(address, subject, body),
            Self::Phone { number } => format!("tel:{}", number.trim()),
            Self::Sms { number, message } => format!("SMSTO:{}:{}", number.trim(), message),
            Self::Wifi(network) => wifi(network),
            Self::Vcard(contact) => vcard(contact),
            Self::Event(event) => vevent(event)?,
        };
        if content.is_empty() {
            return Err(WandelError::Validation(format!(
                "{} payload has no content",
                self.kind()
            )));
        }
        Ok(content)
    }
}

fn mailto(address: &str, subject: &str, body: &str) -> String {
    let mut query = Vec::new();
    if !subject.is_empty() {
        query.push(format!("subject={}", percent_encode(subject)));
    }
    if !body.is_empty() {
        query.push(format!("body={}", percent_encode(body)));
    }
    if query.is_empty() {
        format!("mailto:{}", address.trim())
    } else {
        format!("mailto:{}?{}", address.trim(), query.join("&"))
    }
}

/// Percent-encode everything outside the URI unreserved set.
fn percent_encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

/// Backslash-escape the WIFI field delimiters.
fn escape_wifi(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '\\' | ';' | ',' | ':' | '"') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

fn wifi(network: &WifiNetwork) -> String {
    format!(
        "WIFI:T:{};S:{};P:{};H:{};;",
        network.security.as_str(),
        escape_wifi(&network.ssid),
        escape_wifi(&network.password),
        network.hidden
    )
}

fn vcard(contact: &Contact) -> String {
    let mut lines = vec!["BEGIN:VCARD".to_string(), "VERSION:3.0".to_string()];
    let fields = [
        ("FN", &contact.name),
        ("ORG", &contact.organization),
        ("TEL", &contact.phone),
        ("EMAIL", &contact.email),
        ("URL", &contact.url),
        ("ADR", &contact.address),
    ];
    for (key, value) in fields {
        let value = value.trim();
        if !value.is_empty() {
            lines.push(format!("{}:{}", key, value));
        }
    }
    lines.push("END:VCARD".to_string());
    lines.join("\n")
}

fn vevent(event: &CalendarEvent) -> Result<String> {
    let mut lines = vec!["BEGIN:VEVENT".to_string()];
    if !event.title.trim().is_empty() {
        lines.push(format!("SUMMARY:{}", event.title.trim()));
    }
    if !event.location.trim().is_empty() {
        lines.push(format!("LOCATION:{}", event.location.trim()));
    }
    if !event.start.trim().is_empty() {
        lines.push(format!("DTSTART:{}", compact_datetime(&event.start)?));
    }
    if !event.end.trim().is_empty() {
        lines.push(format!("DTEND:{}", compact_datetime(&event.end)?));
    }
    if !event.description.trim().is_empty() {
        lines.push(format!("DESCRIPTION:{}", event.description.trim()));
    }
    lines.push("END:VEVENT".to_string());
    Ok(lines.join("\n"))
}

/// `2026-03-14T09:30` becomes `20260314T093000Z`.
pub fn compact_datetime(value: &str) -> Result<String> {
    let value = value.trim();
    let parsed = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M"))
        .map_err(|err| {
            WandelError::Validation(format!("invalid event date '{}': {}", value, err))
        })?;
    Ok(parsed.format("%Y%m%dT%H%M%SZ").to_string())
}
