//! Statement supports.
//!
//! A [`StatementSupport`] is the behaviour record of one statement kind:
//! how its argument is parsed, which substatements it accepts, what it does
//! in each phase and how its declared and effective forms are refined.

use crate::error::{SourceError, SourceResult};
use crate::model::{DeclaredStatement, EffectiveStatement};
use crate::state::{StmtContext, StmtContextMut};
use crate::stmt::{ArgumentValue, PrefixedName};
use indexmap::IndexMap;
use schemata_core::{
    ModelProcessingPhase, QName, Revision, StatementSourceReference, XmlNamespace, YangVersion,
    split_prefixed,
};
use std::fmt;

/// Argument parser
pub type ArgumentParser = fn(&str) -> SourceResult<ArgumentValue>;

/// Per-phase callback, run once when a statement reaches the phase
pub type PhaseHook = fn(&mut StmtContextMut<'_>) -> SourceResult<()>;

/// Post-processing of a built declared statement
pub type DeclaredRefiner =
    fn(&StmtContext<'_>, DeclaredStatement) -> SourceResult<DeclaredStatement>;

/// Post-processing of a built effective statement
pub type EffectiveRefiner =
    fn(&StmtContext<'_>, EffectiveStatement) -> SourceResult<EffectiveStatement>;

/// Whether and how a statement takes an argument
#[derive(Clone, Copy)]
pub enum ArgumentSpec {
    /// No argument allowed
    None,
    /// Argument must be present
    Required(ArgumentParser),
    /// Argument may be omitted
    Optional(ArgumentParser),
}

impl fmt::Debug for ArgumentSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Required(_) => f.write_str("Required"),
            Self::Optional(_) => f.write_str("Optional"),
        }
    }
}

/// Allowed occurrence count of a substatement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cardinality {
    /// Minimum occurrences
    pub min: u32,
    /// Maximum occurrences, unbounded if `None`
    pub max: Option<u32>,
}

impl Cardinality {
    fn admits(&self, count: u32) -> bool {
        count >= self.min && self.max.is_none_or(|max| count <= max)
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            Some(max) => write!(f, "[{}, {}]", self.min, max),
            None => write!(f, "[{}, ..]", self.min),
        }
    }
}

/// Substatement cardinality rules of one statement kind
///
/// Keywords are built-in keyword names. Extension instances are not
/// checked.
#[derive(Debug, Clone, Default)]
pub struct SubstatementValidator {
    rules: IndexMap<&'static str, Cardinality>,
}

impl SubstatementValidator {
    /// Create a validator that admits nothing
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit `keyword` between `min` and `max` times
    #[must_use]
    pub fn add(mut self, keyword: &'static str, min: u32, max: Option<u32>) -> Self {
        self.rules.insert(keyword, Cardinality { min, max });
        self
    }

    /// Admit `keyword` any number of times
    #[must_use]
    pub fn add_any(self, keyword: &'static str) -> Self {
        self.add(keyword, 0, None)
    }

    /// Admit `keyword` at most once
    #[must_use]
    pub fn add_optional(self, keyword: &'static str) -> Self {
        self.add(keyword, 0, Some(1))
    }

    /// Require `keyword` exactly once
    #[must_use]
    pub fn add_mandatory(self, keyword: &'static str) -> Self {
        self.add(keyword, 1, Some(1))
    }

    /// Check the built-in keywords of a statement's children
    ///
    /// # Errors
    ///
    /// Returns error on an unlisted keyword or a violated cardinality
    pub fn validate<'k>(
        &self,
        parent: &str,
        children: impl IntoIterator<Item = &'k str>,
        reference: Option<&StatementSourceReference>,
    ) -> SourceResult<()> {
        let mut counts: IndexMap<&str, u32> = IndexMap::new();
        for keyword in children {
            if !self.rules.contains_key(keyword) {
                return Err(SourceError::at(
                    format!("{} is not valid for {}", keyword, parent),
                    reference,
                ));
            }
            *counts.entry(keyword).or_default() += 1;
        }
        for (keyword, cardinality) in &self.rules {
            let count = counts.get(keyword).copied().unwrap_or(0);
            if !cardinality.admits(count) {
                return Err(SourceError::at(
                    format!(
                        "{} occurs {} times in {}, allowed {}",
                        keyword, count, parent, cardinality
                    ),
                    reference,
                ));
            }
        }
        Ok(())
    }
}

/// Behaviour record of one statement kind
pub struct StatementSupport {
    keyword: QName,
    argument: ArgumentSpec,
    validator: Option<SubstatementValidator>,
    hooks: [Option<PhaseHook>; ModelProcessingPhase::ALL.len()],
    declared: Option<DeclaredRefiner>,
    effective: Option<EffectiveRefiner>,
}

impl StatementSupport {
    /// Start describing a statement kind
    #[must_use]
    pub fn builder(keyword: QName) -> StatementSupportBuilder {
        StatementSupportBuilder {
            support: StatementSupport {
                keyword,
                argument: ArgumentSpec::None,
                validator: None,
                hooks: [None; ModelProcessingPhase::ALL.len()],
                declared: None,
                effective: None,
            },
        }
    }

    /// Keyword identity
    #[must_use]
    pub fn keyword(&self) -> &QName {
        &self.keyword
    }

    /// Argument rule
    #[must_use]
    pub fn argument_spec(&self) -> ArgumentSpec {
        self.argument
    }

    /// Parse a raw argument
    ///
    /// # Errors
    ///
    /// Returns error if the argument is missing, unexpected or malformed
    pub fn parse_argument(
        &self,
        raw: Option<&str>,
        reference: Option<&StatementSourceReference>,
    ) -> SourceResult<ArgumentValue> {
        let keyword = self.keyword.local_name();
        match (self.argument, raw) {
            (ArgumentSpec::None, None) => Ok(ArgumentValue::None),
            (ArgumentSpec::None, Some(_)) => Err(SourceError::at(
                format!("{} does not take an argument", keyword),
                reference,
            )),
            (ArgumentSpec::Required(_), None) => Err(SourceError::at(
                format!("{} requires an argument", keyword),
                reference,
            )),
            (ArgumentSpec::Optional(_), None) => Ok(ArgumentValue::None),
            (ArgumentSpec::Required(parse) | ArgumentSpec::Optional(parse), Some(raw)) => {
                parse(raw).map_err(|err| {
                    SourceError::at(
                        format!("Invalid argument of {}: {}", keyword, err.message()),
                        reference,
                    )
                })
            }
        }
    }

    /// Substatement rules, if any
    #[must_use]
    pub fn validator(&self) -> Option<&SubstatementValidator> {
        self.validator.as_ref()
    }

    /// Hook for `phase`, if any
    #[must_use]
    pub fn hook(&self, phase: ModelProcessingPhase) -> Option<PhaseHook> {
        self.hooks[phase.index()]
    }

    pub(crate) fn refine_declared(
        &self,
        ctx: &StmtContext<'_>,
        declared: DeclaredStatement,
    ) -> SourceResult<DeclaredStatement> {
        match self.declared {
            Some(refine) => refine(ctx, declared),
            None => Ok(declared),
        }
    }

    pub(crate) fn refine_effective(
        &self,
        ctx: &StmtContext<'_>,
        effective: EffectiveStatement,
    ) -> SourceResult<EffectiveStatement> {
        match self.effective {
            Some(refine) => refine(ctx, effective),
            None => Ok(effective),
        }
    }
}

impl fmt::Debug for StatementSupport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatementSupport")
            .field("keyword", &self.keyword)
            .field("argument", &self.argument)
            .field("validator", &self.validator.is_some())
            .finish()
    }
}

/// Builder for [`StatementSupport`]
pub struct StatementSupportBuilder {
    support: StatementSupport,
}

impl StatementSupportBuilder {
    /// Require an argument parsed by `parser`
    #[must_use]
    pub fn argument(mut self, parser: ArgumentParser) -> Self {
        self.support.argument = ArgumentSpec::Required(parser);
        self
    }

    /// Accept an optional argument parsed by `parser`
    #[must_use]
    pub fn optional_argument(mut self, parser: ArgumentParser) -> Self {
        self.support.argument = ArgumentSpec::Optional(parser);
        self
    }

    /// Set substatement rules
    #[must_use]
    pub fn validator(mut self, validator: SubstatementValidator) -> Self {
        self.support.validator = Some(validator);
        self
    }

    /// Run `hook` when the statement reaches `phase`
    #[must_use]
    pub fn on_phase(mut self, phase: ModelProcessingPhase, hook: PhaseHook) -> Self {
        self.support.hooks[phase.index()] = Some(hook);
        self
    }

    /// Refine the declared form
    #[must_use]
    pub fn declared(mut self, refine: DeclaredRefiner) -> Self {
        self.support.declared = Some(refine);
        self
    }

    /// Refine the effective form
    #[must_use]
    pub fn effective(mut self, refine: EffectiveRefiner) -> Self {
        self.support.effective = Some(refine);
        self
    }

    /// Finish
    #[must_use]
    pub fn build(self) -> StatementSupport {
        self.support
    }
}

/// Argument kept verbatim
///
/// # Errors
///
/// Never fails
pub fn parse_text(raw: &str) -> SourceResult<ArgumentValue> {
    Ok(ArgumentValue::Text(raw.into()))
}

/// Argument that must be an identifier
///
/// # Errors
///
/// Returns error if `raw` is not an identifier
pub fn parse_identifier(raw: &str) -> SourceResult<ArgumentValue> {
    if !schemata_core::is_identifier(raw) {
        return Err(SourceError::new(format!("{} is not an identifier", raw)));
    }
    Ok(ArgumentValue::Text(raw.into()))
}

/// Argument that must be a revision date
///
/// # Errors
///
/// Returns error if `raw` is not a `YYYY-MM-DD` date
pub fn parse_revision(raw: &str) -> SourceResult<ArgumentValue> {
    Ok(ArgumentValue::Revision(Revision::parse(raw)?))
}

/// Argument that must be a language version
///
/// # Errors
///
/// Returns error if the version is unknown
pub fn parse_version(raw: &str) -> SourceResult<ArgumentValue> {
    Ok(ArgumentValue::Version(YangVersion::parse(raw)?))
}

/// Argument that must be a namespace URI
///
/// # Errors
///
/// Returns error if the URI is empty or contains whitespace
pub fn parse_namespace(raw: &str) -> SourceResult<ArgumentValue> {
    Ok(ArgumentValue::Namespace(XmlNamespace::of(raw)?))
}

/// Absolute schema node identifier such as `/a:b/a:c`
///
/// # Errors
///
/// Returns error if the path is relative, empty or has a malformed step
pub fn parse_schema_path(raw: &str) -> SourceResult<ArgumentValue> {
    let rest = raw
        .strip_prefix('/')
        .ok_or_else(|| SourceError::new(format!("{} is not an absolute schema path", raw)))?;
    let steps = rest
        .split('/')
        .map(|step| {
            let (prefix, local) = split_prefixed(step.trim())?;
            Ok(PrefixedName {
                prefix: prefix.map(str::to_string),
                local: local.to_string(),
            })
        })
        .collect::<SourceResult<Vec<_>>>()?;
    Ok(ArgumentValue::Path(steps))
}
