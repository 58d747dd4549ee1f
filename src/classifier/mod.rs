//! Keyword-based topic classifier for user queries.
//!
//! Decides whether a query is about buying parts and, when possible, which
//! part is being asked about. Matching is plain case-insensitive substring
//! search over fixed phrase tables; no model call is involved.

use serde::Serialize;

/// General purchase/location intent phrases. A hit on any of these marks the
/// query as parts-related on its own.
pub const PURCHASE_PHRASES: &[&str] = &[
    "where can i buy",
    "where to buy",
    "where can i find",
    "buy parts",
    "buy a part",
    "order parts",
    "purchase",
    "parts store",
    "auto parts",
    "junkyard",
    "salvage yard",
    "aftermarket",
    "oem part",
    "near me",
];

/// Cost/price phrases. These only count as parts intent when a named part
/// appears in the same query.
pub const COST_PHRASES: &[&str] = &[
    "how much",
    "cost",
    "price",
    "cheap",
    "expensive",
    "estimate",
    "quote",
];

/// Recognized part names in priority order. The first table entry found in
/// the query wins, regardless of where it appears in the input. Each entry
/// maps a match phrase to the canonical part name reported to callers.
pub const PART_ENTITIES: &[(&str, &str)] = &[
    ("brake pad", "brake pads"),
    ("brake rotor", "brake rotors"),
    ("brake caliper", "brake caliper"),
    ("alternator", "alternator"),
    ("starter", "starter motor"),
    ("battery", "battery"),
    ("spark plug", "spark plugs"),
    ("ignition coil", "ignition coil"),
    ("radiator", "radiator"),
    ("water pump", "water pump"),
    ("thermostat", "thermostat"),
    ("timing belt", "timing belt"),
    ("serpentine belt", "serpentine belt"),
    ("air filter", "air filter"),
    ("cabin filter", "cabin filter"),
    ("oil filter", "oil filter"),
    ("fuel pump", "fuel pump"),
    ("fuel injector", "fuel injector"),
    ("oxygen sensor", "oxygen sensor"),
    ("catalytic converter", "catalytic converter"),
    ("muffler", "muffler"),
    ("shock absorber", "shock absorbers"),
    ("strut", "struts"),
    ("control arm", "control arm"),
    ("wheel bearing", "wheel bearing"),
    ("cv axle", "cv axle"),
    ("headlight", "headlight"),
    ("tail light", "tail light"),
    ("wiper blade", "wiper blades"),
    ("tire", "tires"),
];

/// Classifier verdict for a single query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    /// The query is about locating or pricing parts.
    pub is_topic_match: bool,
    /// Canonical name of the first recognized part, if any. May be `None`
    /// even when `is_topic_match` is true (general intent without a named
    /// part).
    pub extracted_entity: Option<String>,
}

/// Classify a query. Pure function over the phrase tables above.
pub fn classify(query: &str) -> Classification {
    let lowered = query.to_lowercase();

    let purchase_hit = PURCHASE_PHRASES.iter().any(|p| lowered.contains(p));
    let cost_hit = COST_PHRASES.iter().any(|p| lowered.contains(p));
    let entity = extract_entity(&lowered);

    Classification {
        is_topic_match: purchase_hit || (cost_hit && entity.is_some()),
        extracted_entity: entity,
    }
}

/// First part entity found in the (already lowercased) query, by table order.
fn extract_entity(lowered: &str) -> Option<String> {
    PART_ENTITIES
        .iter()
        .find(|(phrase, _)| lowered.contains(phrase))
        .map(|(_, canonical)| canonical.to_string())
}
