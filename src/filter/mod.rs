//! Post filters
//!
//! A filter pattern is either `field:regex` or a bare regex, which applies to
//! the comment. Posts matched by any filter are dropped before they reach a
//! sink.

use crate::imageboard::{schema_for, ImageboardSchema, Post};
use regex::Regex;

/// Post fields a filter can match against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostField {
    Name,
    Tripcode,
    Subject,
    Comment,
    Filename,
}

impl PostField {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "name" => Some(Self::Name),
            "tripcode" | "trip" => Some(Self::Tripcode),
            "subject" => Some(Self::Subject),
            "comment" => Some(Self::Comment),
            "filename" => Some(Self::Filename),
            _ => None,
        }
    }

    /// Whether the imageboard's posts carry this field at all
    fn exists_in(&self, schema: &ImageboardSchema) -> bool {
        let fields = &schema.post_fields;
        match self {
            Self::Name => fields.name.is_some(),
            Self::Tripcode => fields.tripcode.is_some(),
            Self::Subject => fields.subject.is_some(),
            Self::Comment => fields.comment.is_some(),
            Self::Filename => fields.filename.is_some(),
        }
    }

    fn value<'a>(&self, post: &'a Post) -> Option<&'a str> {
        match self {
            Self::Name => post.name.as_deref(),
            Self::Tripcode => post.tripcode.as_deref(),
            Self::Subject => post.subject.as_deref(),
            Self::Comment => post.comment.as_deref(),
            Self::Filename => post.filename.as_deref(),
        }
    }
}

/// One compiled filter
#[derive(Debug, Clone)]
pub struct Filter {
    pub field: PostField,
    pub pattern: Regex,
}

impl Filter {
    pub fn matches(&self, post: &Post) -> bool {
        match self.field {
            // any attached file counts for filename filters
            PostField::Filename => {
                self.field.value(post).is_some_and(|v| self.pattern.is_match(v))
                    || post.files.iter().any(|f| self.pattern.is_match(&f.filename))
            }
            _ => self
                .field
                .value(post)
                .is_some_and(|value| self.pattern.is_match(value)),
        }
    }
}

/// The set of filters active for a run
#[derive(Debug, Clone, Default)]
pub struct FilterSet {
    filters: Vec<Filter>,
}

impl FilterSet {
    /// Compiles filter patterns for an imageboard
    ///
    /// Returns the usable filters and every pattern that was rejected: blank
    /// patterns, bad regexes, and fields the imageboard does not have. A prefix
    /// that names no field is part of a bare comment regex.
    ///
    /// # Example
    ///
    /// ```
    /// use threadwatch::filter::FilterSet;
    ///
    /// let (filters, invalid) = FilterSet::compile(&["name:^Anon", "colour:red", "(("], "4chan");
    /// assert_eq!(filters.len(), 2);
    /// assert_eq!(invalid, vec!["(("]);
    /// ```
    pub fn compile<S: AsRef<str>>(patterns: &[S], imageboard: &str) -> (Self, Vec<String>) {
        let schema = schema_for(imageboard);
        let mut filters = Vec::new();
        let mut invalid = Vec::new();

        for raw in patterns {
            let raw = raw.as_ref();
            match (compile_one(raw), schema) {
                (Some(filter), Some(schema)) if filter.field.exists_in(schema) => {
                    filters.push(filter)
                }
                _ => invalid.push(raw.to_string()),
            }
        }

        (Self { filters }, invalid)
    }

    /// Drops every post matched by at least one filter
    pub fn apply(&self, posts: Vec<Post>) -> Vec<Post> {
        if self.filters.is_empty() {
            return posts;
        }
        posts
            .into_iter()
            .filter(|post| !self.filters.iter().any(|filter| filter.matches(post)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

fn compile_one(raw: &str) -> Option<Filter> {
    let (field, pattern) = match raw.split_once(':') {
        Some((name, pattern)) => match PostField::from_name(name) {
            Some(field) => (field, pattern),
            None => (PostField::Comment, raw),
        },
        None => (PostField::Comment, raw),
    };

    if pattern.trim().is_empty() {
        return None;
    }

    Regex::new(pattern)
        .ok()
        .map(|pattern| Filter { field, pattern })
}
