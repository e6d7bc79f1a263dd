use std::collections::{btree_map, hash_map, BTreeMap, HashMap};
use std::fmt;

use lazy_regex::regex_is_match;
use smallvec::SmallVec;
use thiserror::Error;

/// A parsed recipe program: what to produce for every output column, every
/// header slot, and every named variable.
///
/// The parser populates a `Transformation` one assignment at a time through
/// [`Transformation::declare`] and [`Transformation::push_operation`], and the
/// same methods can be used to assemble a program without any recipe text.
/// Once built, the program is validated and then treated as immutable while
/// rows are processed.
#[derive(Debug, Default)]
pub struct Transformation {
    pub variables: HashMap<VarName, Recipe>,
    /// Variable names in declaration order. Variables are evaluated in this
    /// order on every row, so a variable may reference any earlier one.
    pub variable_order: Vec<VarName>,
    pub columns: BTreeMap<u32, Recipe>,
    pub headers: BTreeMap<u32, Recipe>,
}

/// The pipeline producing one target's value, plus its trailing comment.
#[derive(Debug, Clone)]
pub struct Recipe {
    pub target: Target,
    pub pipe: Vec<Operation>,
    pub comment: String,
}

impl Recipe {
    fn empty(target: Target) -> Self {
        Self {
            target,
            pipe: Vec::new(),
            comment: String::new(),
        }
    }
}

/// The left-hand side of an assignment: which output slot a recipe fills.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// 1-based output column.
    Column(u32),
    /// Header override for a 1-based output column.
    Header(u32),
    /// Named variable, computed once per row before headers and columns.
    Variable(VarName),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Column(n) => write!(f, "column {n}"),
            Target::Header(n) => write!(f, "header {n}"),
            Target::Variable(name) => write!(f, "variable {name}"),
        }
    }
}

/// One step of a recipe pipeline. The name is kept as written in the source;
/// the evaluator dispatches on its lower-cased form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub name: String,
    pub args: SmallVec<[Argument; 2]>,
}

impl Operation {
    pub fn new(name: impl Into<String>, args: impl IntoIterator<Item = Argument>) -> Self {
        Self {
            name: name.into(),
            args: args.into_iter().collect(),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{arg}")?;
        }
        write!(f, ")")
    }
}

/// What an operation argument refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Argument {
    /// Value of a 1-based input column.
    Column(u32),
    /// Value bound to a variable earlier in the row.
    Variable(VarName),
    /// Literal text, used verbatim.
    Literal(String),
    /// The running value threaded between pipeline stages.
    Placeholder,
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Argument::Column(n) => write!(f, "column {n}"),
            Argument::Variable(name) => write!(f, "{name}"),
            Argument::Literal(text) => write!(f, "\"{text}\""),
            Argument::Placeholder => write!(f, "?"),
        }
    }
}

#[derive(Debug, Error)]
#[error("invalid variable name: {0}")]
pub struct InvalidVarName(String);

/// A variable name, `$` included. Valid names are `$` followed by an
/// identifier: a letter or underscore, then letters, digits, or underscores.
#[derive(Clone, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct VarName(String);

impl VarName {
    pub fn new(name: String) -> Result<Self, InvalidVarName> {
        if regex_is_match!(r"^\$[a-zA-Z_][a-zA-Z0-9_]*$", &name) {
            Ok(Self(name))
        } else {
            Err(InvalidVarName(name))
        }
    }
}

impl AsRef<str> for VarName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VarName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Debug for VarName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for VarName {
    type Err = InvalidVarName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VarName::new(s.to_string())
    }
}

impl std::borrow::Borrow<str> for VarName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl std::ops::Deref for VarName {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T: AsRef<str>> std::cmp::PartialEq<T> for VarName {
    fn eq(&self, other: &T) -> bool {
        self.0 == other.as_ref()
    }
}

#[derive(Debug, Error)]
pub enum DeclareError {
    #[error("{0} already defined")]
    AlreadyDefined(Target),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidateError {
    #[error("no column recipes provided")]
    NoColumns,

    #[error("missing column definition for column #{0}")]
    MissingColumn(u32),

    #[error("found header for column {0}, but no recipe for column {0}")]
    OrphanHeader(u32),
}

impl Transformation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a target with an empty pipeline. Declaring the same column,
    /// header, or variable twice is an error.
    pub fn declare(&mut self, target: Target) -> Result<(), DeclareError> {
        match &target {
            Target::Variable(name) => match self.variables.entry(name.clone()) {
                hash_map::Entry::Occupied(_) => {
                    return Err(DeclareError::AlreadyDefined(target));
                }
                hash_map::Entry::Vacant(entry) => {
                    self.variable_order.push(name.clone());
                    entry.insert(Recipe::empty(target.clone()));
                }
            },
            Target::Column(n) => match self.columns.entry(*n) {
                btree_map::Entry::Occupied(_) => {
                    return Err(DeclareError::AlreadyDefined(target));
                }
                btree_map::Entry::Vacant(entry) => {
                    entry.insert(Recipe::empty(target.clone()));
                }
            },
            Target::Header(n) => match self.headers.entry(*n) {
                btree_map::Entry::Occupied(_) => {
                    return Err(DeclareError::AlreadyDefined(target));
                }
                btree_map::Entry::Vacant(entry) => {
                    entry.insert(Recipe::empty(target.clone()));
                }
            },
        }
        Ok(())
    }

    /// Append an operation to a target's pipeline, declaring the target first
    /// if it has not been declared yet.
    pub fn push_operation(&mut self, target: &Target, operation: Operation) {
        if self.recipe_mut(target).is_none() {
            let _ = self.declare(target.clone());
        }
        if let Some(recipe) = self.recipe_mut(target) {
            recipe.pipe.push(operation);
        }
    }

    /// Attach the trailing line comment to a target's recipe.
    pub fn set_comment(&mut self, target: &Target, comment: &str) {
        if let Some(recipe) = self.recipe_mut(target) {
            recipe.comment = comment.to_string();
        }
    }

    fn recipe_mut(&mut self, target: &Target) -> Option<&mut Recipe> {
        match target {
            Target::Variable(name) => self.variables.get_mut(name.as_ref()),
            Target::Column(n) => self.columns.get_mut(n),
            Target::Header(n) => self.headers.get_mut(n),
        }
    }

    /// Structural checks run once before any row is processed: at least one
    /// column, columns dense from 1, and no header without a matching column.
    pub fn validate(&self) -> Result<(), ValidateError> {
        let num_columns = self.columns.len() as u32;
        if num_columns == 0 {
            return Err(ValidateError::NoColumns);
        }
        for n in 1..=num_columns {
            if !self.columns.contains_key(&n) {
                return Err(ValidateError::MissingColumn(n));
            }
        }
        for n in self.headers.keys() {
            if !self.columns.contains_key(n) {
                return Err(ValidateError::OrphanHeader(*n));
            }
        }
        Ok(())
    }
}

/// Listing of the parsed program, one section per target kind. Used by the
/// CLI `--dump` flag.
impl fmt::Display for Transformation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn section<'a>(
            f: &mut fmt::Formatter<'_>,
            title: &str,
            recipes: impl Iterator<Item = &'a Recipe>,
        ) -> fmt::Result {
            writeln!(f, "{title}:\n=====")?;
            for recipe in recipes {
                writeln!(f, "{}", recipe.target)?;
                write!(f, "pipe: ")?;
                for operation in &recipe.pipe {
                    write!(f, "{operation} -> ")?;
                }
                writeln!(f)?;
                if !recipe.comment.is_empty() {
                    writeln!(f, "comment: # {}", recipe.comment)?;
                }
                writeln!(f, "---")?;
            }
            Ok(())
        }

        section(f, "Headers", self.headers.values())?;
        section(
            f,
            "Variables",
            self.variable_order
                .iter()
                .filter_map(|name| self.variables.get(name.as_ref())),
        )?;
        section(f, "Columns", self.columns.values())
    }
}

/// Per-row bindings: the input columns, the variables computed so far, and
/// the 1-based line number. Created fresh for every input row.
#[derive(Debug)]
pub struct LineContext {
    pub variables: HashMap<String, String>,
    columns: Vec<String>,
    pub line_no: u64,
}

impl LineContext {
    pub fn new(row: Vec<String>, line_no: u64) -> Self {
        Self {
            variables: HashMap::new(),
            columns: row,
            line_no,
        }
    }

    /// Value of a 1-based input column, if the row has that many fields.
    pub fn column(&self, index: u32) -> Option<&str> {
        if index == 0 {
            return None;
        }
        self.columns.get(index as usize - 1).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str) -> VarName {
        VarName::new(name.to_string()).unwrap()
    }

    #[test]
    fn var_name_requires_dollar_prefix() {
        assert!(VarName::new("$foo".to_string()).is_ok());
        assert!(VarName::new("$_1".to_string()).is_ok());
        assert!(VarName::new("foo".to_string()).is_err());
        assert!(VarName::new("$".to_string()).is_err());
        assert!(VarName::new("$1foo".to_string()).is_err());
    }

    #[test]
    fn declare_rejects_duplicates() {
        let mut t = Transformation::new();
        t.declare(Target::Column(1)).unwrap();
        let err = t.declare(Target::Column(1)).unwrap_err();
        assert_eq!(err.to_string(), "column 1 already defined");

        t.declare(Target::Header(2)).unwrap();
        let err = t.declare(Target::Header(2)).unwrap_err();
        assert_eq!(err.to_string(), "header 2 already defined");

        t.declare(Target::Variable(var("$foo"))).unwrap();
        let err = t.declare(Target::Variable(var("$foo"))).unwrap_err();
        assert_eq!(err.to_string(), "variable $foo already defined");
    }

    #[test]
    fn declaration_order_is_preserved() {
        let mut t = Transformation::new();
        for name in ["$c", "$a", "$b"] {
            t.declare(Target::Variable(var(name))).unwrap();
        }
        let order: Vec<&str> = t.variable_order.iter().map(|n| n.as_ref()).collect();
        assert_eq!(order, ["$c", "$a", "$b"]);
    }

    #[test]
    fn validate_requires_columns() {
        let t = Transformation::new();
        assert_eq!(t.validate(), Err(ValidateError::NoColumns));
    }

    #[test]
    fn validate_rejects_column_gaps() {
        let mut t = Transformation::new();
        t.declare(Target::Column(1)).unwrap();
        t.declare(Target::Column(3)).unwrap();
        let err = t.validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "missing column definition for column #2"
        );
    }

    #[test]
    fn validate_rejects_orphan_headers() {
        let mut t = Transformation::new();
        t.declare(Target::Column(1)).unwrap();
        t.declare(Target::Header(3)).unwrap();
        let err = t.validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "found header for column 3, but no recipe for column 3"
        );
    }

    #[test]
    fn context_columns_are_one_based() {
        let ctx = LineContext::new(vec!["a".into(), "b".into()], 1);
        assert_eq!(ctx.column(1), Some("a"));
        assert_eq!(ctx.column(2), Some("b"));
        assert_eq!(ctx.column(0), None);
        assert_eq!(ctx.column(3), None);
    }
}
