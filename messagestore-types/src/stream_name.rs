//! Stream name interpretation.
//!
//! A stream name is a category segment optionally followed by `-` and an
//! entity id: `cart` is a category stream, `cart-123` is an entity stream.
//! The category may carry types after a `:` (`cart:command-123`), and the id
//! may be compound (`cart-123+456`, whose cardinal id is `123`).
//!
//! The free functions work on raw `&str` so that adapters can classify names
//! coming back from the backend without re-validating them.

use nutype::nutype;

/// Separates the category from the entity id.
pub const ID_SEPARATOR: char = '-';
/// Separates the parts of a compound id.
pub const COMPOUND_ID_SEPARATOR: char = '+';
/// Separates the entity name from the category types.
pub const CATEGORY_TYPE_SEPARATOR: char = ':';
/// Separates individual category types.
pub const CATEGORY_TYPES_SEPARATOR: char = '+';

/// Validated stream identifier.
///
/// Stream names must contain something other than whitespace. The name is
/// otherwise kept verbatim, surrounding whitespace included, so a name read
/// back from the backend addresses the same stream it was written to.
/// Segment structure is interpreted by the accessor methods.
///
/// # Examples
///
/// ```ignore
/// use messagestore_types::StreamName;
///
/// let entity = StreamName::try_new("cart-123").expect("valid stream name");
/// assert_eq!(entity.category(), "cart");
/// assert_eq!(entity.id(), Some("123"));
/// assert!(!entity.is_category());
///
/// let category = StreamName::try_new("cart").expect("valid stream name");
/// assert!(category.is_category());
/// ```
#[nutype(
    validate(predicate = |name: &str| !name.trim().is_empty()),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        Hash,
        AsRef,
        Deref,
        Display,
        Serialize,
        Deserialize
    )
)]
pub struct StreamName(String);

impl StreamName {
    /// Build an entity or category stream name from its segments.
    ///
    /// `types` are appended to the category after `:`, joined by `+`; `id`
    /// is appended after `-` when present.
    pub fn compose(
        category: &str,
        types: &[&str],
        id: Option<&str>,
    ) -> Result<Self, StreamNameError> {
        let mut name = String::from(category);

        if !types.is_empty() {
            name.push(CATEGORY_TYPE_SEPARATOR);
            name.push_str(&types.join(&CATEGORY_TYPES_SEPARATOR.to_string()));
        }

        if let Some(id) = id {
            name.push(ID_SEPARATOR);
            name.push_str(id);
        }

        Self::try_new(name)
    }

    /// Build a category stream name, optionally with category types.
    pub fn category_of(category: &str, types: &[&str]) -> Result<Self, StreamNameError> {
        Self::compose(category, types, None)
    }

    /// The category segment (everything before the first `-`).
    pub fn category(&self) -> &str {
        category(self.as_str())
    }

    /// The entity id segment, `None` for a category stream.
    pub fn id(&self) -> Option<&str> {
        id(self.as_str())
    }

    /// The first part of a compound id.
    pub fn cardinal_id(&self) -> Option<&str> {
        cardinal_id(self.as_str())
    }

    /// The category without its types.
    pub fn entity_name(&self) -> &str {
        entity_name(self.as_str())
    }

    /// The category types, empty when the category carries none.
    pub fn category_types(&self) -> Vec<&str> {
        category_types(self.as_str())
    }

    /// True when the name has no entity id segment.
    pub fn is_category(&self) -> bool {
        is_category(self.as_str())
    }
}

/// Category segment of a raw stream name.
pub fn category(stream_name: &str) -> &str {
    stream_name
        .split_once(ID_SEPARATOR)
        .map_or(stream_name, |(category, _)| category)
}

/// Entity id segment of a raw stream name.
pub fn id(stream_name: &str) -> Option<&str> {
    stream_name.split_once(ID_SEPARATOR).map(|(_, id)| id)
}

/// Cardinal id of a raw stream name.
pub fn cardinal_id(stream_name: &str) -> Option<&str> {
    id(stream_name).map(|id| {
        id.split_once(COMPOUND_ID_SEPARATOR)
            .map_or(id, |(cardinal, _)| cardinal)
    })
}

/// Category of a raw stream name without its types.
pub fn entity_name(stream_name: &str) -> &str {
    let category = category(stream_name);
    category
        .split_once(CATEGORY_TYPE_SEPARATOR)
        .map_or(category, |(entity, _)| entity)
}

/// Category types of a raw stream name.
pub fn category_types(stream_name: &str) -> Vec<&str> {
    category(stream_name)
        .split_once(CATEGORY_TYPE_SEPARATOR)
        .map(|(_, types)| {
            types
                .split(CATEGORY_TYPES_SEPARATOR)
                .filter(|kind| !kind.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// True when a raw stream name carries no entity id segment.
pub fn is_category(stream_name: &str) -> bool {
    !stream_name.contains(ID_SEPARATOR)
}
