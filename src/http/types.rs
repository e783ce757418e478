use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Cow;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// `OffsetDateTime` provides RFC-3339 (ISO-8601 subset) serialization, but the default
/// `serde::Serialize` implementation produces array of integers, which is great for binary
/// serialization, but infeasible to consume when returned from an API, and certainly
/// not human-readable.
///
/// With this wrapper type, we override this to provide the serialization format we want.
///
/// `chrono::DateTime` doesn't need this treatment, but Chrono sadly seems to have stagnated,
/// and has a few more papercuts than I'd like:
///
/// * Having to import both `DateTime` and `Utc` everywhere gets annoying quickly.
/// * lack of `const fn` constructors anywhere (especially for `chrono::Duration`)
/// * `cookie::CookieBuilder` (used by Actix-web and `tower-cookies`) bakes-in `time::Duration`
///   for setting the expiration
///     * not really Chrono's fault but certainly doesn't help.
#[derive(sqlx::Type, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[sqlx(transparent)]
pub struct Timestamptz(pub OffsetDateTime);

impl Serialize for Timestamptz {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let formatted = self.0.format(&Rfc3339).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&formatted)
    }
}

impl<'de> Deserialize<'de> for Timestamptz {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = Cow::<'de, str>::deserialize(deserializer)?;
        OffsetDateTime::parse(&s, &Rfc3339)
            .map(Self)
            .map_err(serde::de::Error::custom)
    }
}

/// Body of every response that only reports what happened, e.g. `{ "message": "Post liked successfully" }`.
#[derive(serde::Serialize, serde::Deserialize, Debug)]
pub struct MessageBody {
    pub message: Cow<'static, str>,
}

impl MessageBody {
    pub fn new(message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
