//! Typed statements for the tool's Python command shell.
//!
//! A [`Statement`] is a call: a (possibly dotted) function name, positional
//! arguments and keyword arguments. Values are [`Literal`]s and are only
//! rendered to Python source when the statement is displayed, so quoting and
//! number formatting live in one place.

use std::{
    fmt,
    path::{Path, PathBuf},
};

use thiserror::Error;

/// Statement build error.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StatementError {
    #[error("Invalid function name: {0:?}")]
    InvalidName(String),
    #[error("Invalid keyword argument name: {0:?}")]
    InvalidKeyword(String),
    #[error("Invalid assignment target: {0:?}")]
    InvalidTarget(String),
}

/// A Python literal (or raw expression) used as an argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Literal>),
    /// Inserted verbatim, e.g. a nested call such as `me.direction(...)`.
    Raw(String),
}

impl Literal {
    /// A verbatim expression.
    #[must_use]
    pub fn raw(expr: impl Into<String>) -> Self {
        Self::Raw(expr.into())
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Bool(true) => f.write_str("True"),
            Self::Bool(false) => f.write_str("False"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write_float(f, *x),
            Self::Str(s) => write_str_literal(f, s),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Raw(expr) => f.write_str(expr),
        }
    }
}

fn write_float(f: &mut fmt::Formatter<'_>, x: f64) -> fmt::Result {
    if x.is_nan() {
        f.write_str("float('nan')")
    } else if x.is_infinite() {
        f.write_str(if x > 0.0 { "float('inf')" } else { "-float('inf')" })
    } else {
        // Debug keeps a trailing `.0` on integral values, so Python sees a float.
        write!(f, "{x:?}")
    }
}

fn write_str_literal(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    f.write_str("'")?;
    for c in s.chars() {
        match c {
            '\\' => f.write_str(r"\\")?,
            '\'' => f.write_str(r"\'")?,
            '\n' => f.write_str(r"\n")?,
            '\r' => f.write_str(r"\r")?,
            '\t' => f.write_str(r"\t")?,
            c => write!(f, "{c}")?,
        }
    }
    f.write_str("'")
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for Literal {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<&String> for Literal {
    fn from(value: &String) -> Self {
        Self::Str(value.clone())
    }
}

impl From<bool> for Literal {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

macro_rules! int_literal {
    ($($t:ty),*) => {
        $(impl From<$t> for Literal {
            fn from(value: $t) -> Self {
                Self::Int(i64::from(value))
            }
        })*
    };
}

int_literal!(i8, i16, i32, i64, u8, u16, u32);

impl From<usize> for Literal {
    fn from(value: usize) -> Self {
        i64::try_from(value).map_or(Self::Float(value as f64), Self::Int)
    }
}

impl From<f64> for Literal {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<f32> for Literal {
    fn from(value: f32) -> Self {
        Self::Float(f64::from(value))
    }
}

impl From<&Path> for Literal {
    fn from(value: &Path) -> Self {
        Self::Str(value.to_string_lossy().into_owned())
    }
}

impl From<PathBuf> for Literal {
    fn from(value: PathBuf) -> Self {
        Self::from(value.as_path())
    }
}

impl From<&PathBuf> for Literal {
    fn from(value: &PathBuf) -> Self {
        Self::from(value.as_path())
    }
}

impl<T: Into<Self>> From<Vec<T>> for Literal {
    fn from(value: Vec<T>) -> Self {
        Self::List(value.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Self>> From<Option<T>> for Literal {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::None, Into::into)
    }
}

impl From<Statement> for Literal {
    fn from(value: Statement) -> Self {
        Self::Raw(value.to_string())
    }
}

/// A single call statement, e.g. `importuvfits(fitsfile='a.fits', vis='a.ms')`.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// Function name, possibly dotted (`cl.addcomponent`).
    pub name: String,
    /// Positional arguments.
    pub args: Vec<Literal>,
    /// Keyword arguments, in insertion order.
    pub kwargs: Vec<(String, Literal)>,
    /// Names the result is unpacked into (`x, y = f()`); empty for a bare call.
    pub targets: Vec<String>,
}

impl Statement {
    /// Start a call to `name`.
    #[must_use]
    pub fn call<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
            kwargs: Vec::new(),
            targets: Vec::new(),
        }
    }

    /// Bind the call's result to one or more names.
    #[must_use]
    pub fn assign_to<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.targets = targets.into_iter().map(Into::into).collect();
        self
    }

    /// Add a positional argument.
    #[must_use]
    pub fn arg(mut self, value: impl Into<Literal>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Set a keyword argument. An existing key keeps its position and takes
    /// the new value.
    #[must_use]
    pub fn kwarg(mut self, key: impl Into<String>, value: impl Into<Literal>) -> Self {
        self.set_kwarg(key, value);
        self
    }

    /// Set several keyword arguments, in order.
    #[must_use]
    pub fn kwargs<I, K, V>(mut self, kwargs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Literal>,
    {
        for (k, v) in kwargs {
            self.set_kwarg(k, v);
        }
        self
    }

    /// In-place form of [`Statement::kwarg`].
    pub fn set_kwarg(&mut self, key: impl Into<String>, value: impl Into<Literal>) {
        let key = key.into();
        let value = value.into();
        match self.kwargs.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.kwargs.push((key, value)),
        }
    }

    /// Look up a keyword argument.
    #[must_use]
    pub fn get_kwarg(&self, key: &str) -> Option<&Literal> {
        self.kwargs.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Check the function and keyword names are identifiers.
    ///
    /// # Errors
    /// Returns error naming the first offending name.
    pub fn validate(&self) -> Result<(), StatementError> {
        if self.name.is_empty() || !self.name.split('.').all(is_identifier) {
            return Err(StatementError::InvalidName(self.name.clone()));
        }
        if let Some((k, _)) = self.kwargs.iter().find(|(k, _)| !is_identifier(k)) {
            return Err(StatementError::InvalidKeyword(k.clone()));
        }
        if let Some(t) = self.targets.iter().find(|t| !is_identifier(t)) {
            return Err(StatementError::InvalidTarget(t.clone()));
        }
        Ok(())
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.targets.is_empty() {
            write!(f, "{} = ", self.targets.join(", "))?;
        }
        write!(f, "{}(", self.name)?;
        let positional = self.args.iter().map(|a| (None, a));
        let keyword = self.kwargs.iter().map(|(k, v)| (Some(k), v));
        for (i, (key, value)) in positional.chain(keyword).enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            if let Some(key) = key {
                write!(f, "{key}=")?;
            }
            write!(f, "{value}")?;
        }
        f.write_str(")")
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c == '_' || c.is_ascii_alphabetic())
        && chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_positional_then_keyword() {
        let stmt = Statement::call("exportfits")
            .arg("a.image")
            .kwarg("fitsimage", "a.fits")
            .kwarg("overwrite", false);
        assert_eq!(
            stmt.to_string(),
            "exportfits('a.image', fitsimage='a.fits', overwrite=False)"
        );
    }

    #[test]
    fn empty_call() {
        assert_eq!(Statement::call("tasklist").to_string(), "tasklist()");
    }

    #[test]
    fn string_escaping() {
        let lit = Literal::from("it's a\\path\nwith\ttabs");
        assert_eq!(lit.to_string(), r"'it\'s a\\path\nwith\ttabs'");
    }

    #[test]
    fn numbers_keep_their_python_type() {
        assert_eq!(Literal::from(200).to_string(), "200");
        assert_eq!(Literal::from(2.0).to_string(), "2.0");
        assert_eq!(Literal::from(0.25).to_string(), "0.25");
        assert_eq!(Literal::from(1e-5).to_string(), "1e-5");
        assert_eq!(Literal::from(f64::NAN).to_string(), "float('nan')");
        assert_eq!(Literal::from(f64::NEG_INFINITY).to_string(), "-float('inf')");
    }

    #[test]
    fn lists_options_and_paths() {
        let lit = Literal::from(vec![PathBuf::from("/d/a.ms"), PathBuf::from("/d/b.ms")]);
        assert_eq!(lit.to_string(), "['/d/a.ms', '/d/b.ms']");
        assert_eq!(Literal::from(None::<i32>).to_string(), "None");
        assert_eq!(Literal::from(vec![512, 512]).to_string(), "[512, 512]");
    }

    #[test]
    fn kwarg_replaces_in_place() {
        let stmt = Statement::call("clean")
            .kwarg("niter", 0)
            .kwarg("vis", "a.ms")
            .kwarg("niter", 500);
        assert_eq!(stmt.to_string(), "clean(niter=500, vis='a.ms')");
        assert_eq!(stmt.get_kwarg("niter"), Some(&Literal::Int(500)));
    }

    #[test]
    fn nested_statement_is_raw() {
        let dir = Statement::call("me.direction")
            .arg("J2000")
            .arg("10deg")
            .arg("20deg");
        let stmt = Statement::call("sm.setfield").kwarg("direction", dir);
        assert_eq!(
            stmt.to_string(),
            "sm.setfield(direction=me.direction('J2000', '10deg', '20deg'))"
        );
    }

    #[test]
    fn unpacking_assignment() {
        let stmt = Statement::call("drivecasa_load_antennalist")
            .arg("/cfg/vla.a.cfg")
            .assign_to(["_dc_ant_x", "_dc_ant_y"]);
        assert_eq!(
            stmt.to_string(),
            "_dc_ant_x, _dc_ant_y = drivecasa_load_antennalist('/cfg/vla.a.cfg')"
        );
        assert!(stmt.validate().is_ok());
        assert_eq!(
            Statement::call("f").assign_to(["a b"]).validate(),
            Err(StatementError::InvalidTarget("a b".into()))
        );
    }

    #[test]
    fn validation() {
        assert!(Statement::call("cl.addcomponent").validate().is_ok());
        assert_eq!(
            Statement::call("bad name").validate(),
            Err(StatementError::InvalidName("bad name".into()))
        );
        assert_eq!(
            Statement::call("cl.").validate(),
            Err(StatementError::InvalidName("cl.".into()))
        );
        assert_eq!(
            Statement::call("clean").kwarg("2x", 1).validate(),
            Err(StatementError::InvalidKeyword("2x".into()))
        );
    }
}
