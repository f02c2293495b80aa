use thiserror::Error;

use super::accept::LanguageTag;
use super::media_type::{MediaType, MediaTypeError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NegotiationError {
    #[error("a variant needs at least one of media type, language or encoding")]
    EmptyVariant,
    #[error("no variants to choose from")]
    NoCandidates,
    #[error(transparent)]
    MediaType(#[from] MediaTypeError),
}

/// One representation a resource can produce.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Variant {
    media_type: Option<MediaType>,
    language: Option<LanguageTag>,
    encoding: Option<String>,
}

impl Variant {
    pub fn new(
        media_type: Option<MediaType>,
        language: Option<LanguageTag>,
        encoding: Option<&str>,
    ) -> Result<Self, NegotiationError> {
        if media_type.is_none() && language.is_none() && encoding.is_none() {
            return Err(NegotiationError::EmptyVariant);
        }
        Ok(Self {
            media_type,
            language,
            encoding: encoding.map(str::to_string),
        })
    }

    pub fn media_type(&self) -> Option<&MediaType> {
        self.media_type.as_ref()
    }

    pub fn language(&self) -> Option<&LanguageTag> {
        self.language.as_ref()
    }

    pub fn encoding(&self) -> Option<&str> {
        self.encoding.as_deref()
    }
}

/// Builds the cartesian product of media types, languages and encodings.
///
/// Each call to [`add`](Self::add) emits the product of the values collected
/// since the previous call; a dimension with no values contributes `None`.
///
/// # Examples
///
/// ```rust
/// use bramble_core::http::media_type::MediaType;
/// use bramble_core::http::accept::LanguageTag;
/// use bramble_core::http::variant::VariantListBuilder;
///
/// let variants = VariantListBuilder::new()
///     .media_types([MediaType::text_plain(), MediaType::text_html()])
///     .languages([LanguageTag::parse("en"), LanguageTag::parse("fr")])
///     .build();
/// assert_eq!(variants.len(), 4);
/// ```
#[derive(Debug, Clone, Default)]
pub struct VariantListBuilder {
    variants: Vec<Variant>,
    media_types: Vec<MediaType>,
    languages: Vec<LanguageTag>,
    encodings: Vec<String>,
}

impl VariantListBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn media_types(mut self, media_types: impl IntoIterator<Item = MediaType>) -> Self {
        self.media_types.extend(media_types);
        self
    }

    pub fn languages(mut self, languages: impl IntoIterator<Item = LanguageTag>) -> Self {
        self.languages.extend(languages);
        self
    }

    pub fn encodings<S: Into<String>>(mut self, encodings: impl IntoIterator<Item = S>) -> Self {
        self.encodings.extend(encodings.into_iter().map(Into::into));
        self
    }

    pub fn add(mut self) -> Self {
        let media_types = options(std::mem::take(&mut self.media_types));
        let languages = options(std::mem::take(&mut self.languages));
        let encodings = options(std::mem::take(&mut self.encodings));
        for media_type in &media_types {
            for language in &languages {
                for encoding in &encodings {
                    if media_type.is_none() && language.is_none() && encoding.is_none() {
                        continue;
                    }
                    self.variants.push(Variant {
                        media_type: media_type.clone(),
                        language: language.clone(),
                        encoding: encoding.clone(),
                    });
                }
            }
        }
        self
    }

    pub fn build(self) -> Vec<Variant> {
        self.add().variants
    }
}

fn options<T>(values: Vec<T>) -> Vec<Option<T>> {
    if values.is_empty() {
        vec![None]
    } else {
        values.into_iter().map(Some).collect()
    }
}
