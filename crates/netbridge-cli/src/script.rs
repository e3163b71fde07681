//! Bridge Scripts
//!
//! A script is one statement per line:
//!
//! ```text
//! # train for a few iterations
//! $solver = get_solver "solver.toml"
//! $attrs = solver_get_attr $solver
//! net_set_input_arrays $attrs.hNet_net {"single": {"dims": [1, 1, 2, 4], "data": [0, 1, 2, 3, 4, 5, 6, 7]}} [1, 2, 3, 4] 1
//! solver_step $solver 10
//! $iter = solver_get_iter $solver
//! ```
//!
//! Arguments are JSON literals or `$name` references to earlier results.
//! A reference may select into a result: `.field` picks a struct field and
//! `[n]` the n-th element (1-based) of a cell, handle row or double array.
//!
//! Literals map to host values as follows:
//!
//! - strings become strings, numbers become double scalars
//! - arrays of numbers become double row vectors, other arrays cells
//! - `{"single": {"dims": [..], "data": [..]}}` and the `"double"`
//!   counterpart become arrays with explicit dimensions
//! - `null` is the empty value

use std::fmt;

use netbridge_array::{DoubleArray, SingleArray};
use netbridge_dispatch::{BridgeContext, BridgeError, Dispatcher, HostValue};
use rustc_hash::FxHashMap;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Script errors, tagged with the 1-based line they occurred on
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScriptError {
    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("line {line}: undefined variable ${name}")]
    UndefinedVariable { line: usize, name: String },

    #[error("line {line}: {reference} does not select a value")]
    BadSelector { line: usize, reference: String },

    #[error("line {line}: {command} failed: {source}")]
    Command {
        line: usize,
        command: String,
        source: BridgeError,
    },
}

impl ScriptError {
    fn syntax(line: usize, message: impl Into<String>) -> Self {
        ScriptError::Syntax {
            line,
            message: message.into(),
        }
    }
}

/// One step of a variable reference
#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    Field(String),
    Index(usize),
}

/// `$name` followed by any number of selectors
#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    pub name: String,
    pub path: Vec<Selector>,
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", self.name)?;
        for selector in &self.path {
            match selector {
                Selector::Field(name) => write!(f, ".{}", name)?,
                Selector::Index(idx) => write!(f, "[{}]", idx)?,
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Literal(HostValue),
    Var(Reference),
}

/// A parsed script line
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub line: usize,
    pub target: Option<String>,
    pub command: String,
    pub args: Vec<Arg>,
}

impl Statement {
    /// How the statement's result is echoed, if at all
    pub fn render(&self, value: &HostValue) -> Option<String> {
        match (&self.target, value) {
            (Some(name), value) => Some(format!("${} = {}", name, value)),
            (None, HostValue::Empty) => None,
            (None, value) => Some(format!("ans = {}", value)),
        }
    }
}

/// Parse a whole script
pub fn parse(text: &str) -> Result<Vec<Statement>, ScriptError> {
    let mut statements = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        if let Some(statement) = parse_line(idx + 1, raw)? {
            statements.push(statement);
        }
    }
    Ok(statements)
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Split a leading identifier off `text`
fn take_ident(text: &str) -> (&str, &str) {
    let end = text.find(|c: char| !is_ident_char(c)).unwrap_or(text.len());
    text.split_at(end)
}

fn parse_line(line: usize, raw: &str) -> Result<Option<Statement>, ScriptError> {
    let mut rest = raw.trim();
    if rest.is_empty() || rest.starts_with('#') {
        return Ok(None);
    }

    let mut target = None;
    if let Some(after) = rest.strip_prefix('$') {
        let (name, tail) = take_ident(after);
        let tail = tail.trim_start();
        let Some(tail) = tail.strip_prefix('=') else {
            return Err(ScriptError::syntax(line, format!("expected '=' after ${}", name)));
        };
        if name.is_empty() {
            return Err(ScriptError::syntax(line, "missing variable name before '='"));
        }
        target = Some(name.to_string());
        rest = tail.trim_start();
    }

    let (command, tail) = take_ident(rest);
    if command.is_empty() {
        return Err(ScriptError::syntax(line, "expected a command name"));
    }
    if !tail.is_empty() && !tail.starts_with(char::is_whitespace) {
        return Err(ScriptError::syntax(
            line,
            format!("unexpected character after command '{}'", command),
        ));
    }

    Ok(Some(Statement {
        line,
        target,
        command: command.to_string(),
        args: parse_args(line, tail)?,
    }))
}

fn parse_args(line: usize, text: &str) -> Result<Vec<Arg>, ScriptError> {
    let mut args = Vec::new();
    let mut rest = text.trim_start();

    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix('$') {
            let (reference, tail) = parse_reference(line, after)?;
            args.push(Arg::Var(reference));
            rest = tail;
        } else {
            let mut stream = serde_json::Deserializer::from_str(rest).into_iter::<Value>();
            let value = match stream.next() {
                Some(Ok(value)) => value,
                Some(Err(err)) => return Err(ScriptError::syntax(line, err.to_string())),
                None => break,
            };
            let consumed = stream.byte_offset();
            let value = literal(value).map_err(|message| ScriptError::syntax(line, message))?;
            args.push(Arg::Literal(value));
            rest = &rest[consumed..];
        }

        if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
            return Err(ScriptError::syntax(
                line,
                "arguments must be separated by whitespace",
            ));
        }
        rest = rest.trim_start();
    }
    Ok(args)
}

fn parse_reference(line: usize, text: &str) -> Result<(Reference, &str), ScriptError> {
    let (name, mut rest) = take_ident(text);
    if name.is_empty() {
        return Err(ScriptError::syntax(line, "expected a variable name after '$'"));
    }

    let mut path = Vec::new();
    loop {
        if let Some(after) = rest.strip_prefix('.') {
            let (field, tail) = take_ident(after);
            if field.is_empty() {
                return Err(ScriptError::syntax(line, "expected a field name after '.'"));
            }
            path.push(Selector::Field(field.to_string()));
            rest = tail;
        } else if let Some(after) = rest.strip_prefix('[') {
            let close = after
                .find(']')
                .ok_or_else(|| ScriptError::syntax(line, "unclosed '['"))?;
            let idx = after[..close]
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|&idx| idx > 0)
                .ok_or_else(|| {
                    ScriptError::syntax(line, "an index must be a positive integer")
                })?;
            path.push(Selector::Index(idx));
            rest = &after[close + 1..];
        } else {
            break;
        }
    }

    let reference = Reference {
        name: name.to_string(),
        path,
    };
    Ok((reference, rest))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ArrayLiteral {
    dims: Vec<usize>,
    data: Vec<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase", deny_unknown_fields)]
enum TypedArray {
    Single(ArrayLiteral),
    Double(ArrayLiteral),
}

fn literal(value: Value) -> Result<HostValue, String> {
    let host = match value {
        Value::Null => HostValue::Empty,
        Value::Bool(_) => return Err("booleans are not supported, use 0 or 1".to_string()),
        Value::Number(n) => {
            HostValue::scalar(n.as_f64().ok_or_else(|| format!("{} is not representable", n))?)
        }
        Value::String(s) => HostValue::string(s),
        Value::Array(items) if items.iter().all(Value::is_number) => {
            HostValue::double_row(items.iter().filter_map(Value::as_f64).collect())
        }
        Value::Array(items) => HostValue::Cell(
            items
                .into_iter()
                .map(literal)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        object @ Value::Object(_) => {
            let typed: TypedArray = serde_json::from_value(object).map_err(|e| {
                format!("objects must be {{\"single\": ..}} or {{\"double\": ..}}: {}", e)
            })?;
            match typed {
                TypedArray::Single(ArrayLiteral { dims, data }) => {
                    let data = data.into_iter().map(|v| v as f32).collect();
                    HostValue::Single(SingleArray::new(dims, data).map_err(|e| e.to_string())?)
                }
                TypedArray::Double(ArrayLiteral { dims, data }) => {
                    HostValue::Double(DoubleArray::new(dims, data).map_err(|e| e.to_string())?)
                }
            }
        }
    };
    Ok(host)
}

fn select(value: &HostValue, selector: &Selector) -> Option<HostValue> {
    match (value, selector) {
        (value, Selector::Field(name)) => value.field(name).cloned(),
        (HostValue::Cell(items), Selector::Index(idx)) => items.get(idx - 1).cloned(),
        (HostValue::Handles(tokens), Selector::Index(idx)) => {
            tokens.get(idx - 1).copied().map(HostValue::Handle)
        }
        (HostValue::Double(array), Selector::Index(idx)) => {
            array.as_slice().get(idx - 1).map(|&v| HostValue::scalar(v))
        }
        _ => None,
    }
}

/// Executes statements against one bridge, keeping the variables
/// assigned so far.
pub struct Session {
    dispatcher: Dispatcher,
    ctx: BridgeContext,
    vars: FxHashMap<String, HostValue>,
}

impl Session {
    pub fn new(dispatcher: Dispatcher, ctx: BridgeContext) -> Self {
        Self {
            dispatcher,
            ctx,
            vars: FxHashMap::default(),
        }
    }

    fn resolve(&self, line: usize, reference: &Reference) -> Result<HostValue, ScriptError> {
        let mut value = self
            .vars
            .get(&reference.name)
            .ok_or_else(|| ScriptError::UndefinedVariable {
                line,
                name: reference.name.clone(),
            })?
            .clone();
        for selector in &reference.path {
            value = select(&value, selector).ok_or_else(|| ScriptError::BadSelector {
                line,
                reference: reference.to_string(),
            })?;
        }
        Ok(value)
    }

    /// Run one statement and return its result.
    ///
    /// Several results are gathered into a cell.
    pub fn execute(&mut self, statement: &Statement) -> Result<HostValue, ScriptError> {
        let args = statement
            .args
            .iter()
            .map(|arg| match arg {
                Arg::Literal(value) => Ok(value.clone()),
                Arg::Var(reference) => self.resolve(statement.line, reference),
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut results = self
            .dispatcher
            .dispatch(&mut self.ctx, &statement.command, &args)
            .map_err(|source| ScriptError::Command {
                line: statement.line,
                command: statement.command.clone(),
                source,
            })?;

        let value = match results.len() {
            0 => HostValue::Empty,
            1 => results.remove(0),
            _ => HostValue::Cell(results),
        };
        if let Some(target) = &statement.target {
            self.vars.insert(target.clone(), value.clone());
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netbridge_dispatch::BridgeConfig;
    use pretty_assertions::assert_eq;

    fn session() -> Session {
        Session::new(
            Dispatcher::new().unwrap(),
            BridgeContext::with_cpu_engine(BridgeConfig::default()).unwrap(),
        )
    }

    fn run(session: &mut Session, text: &str) -> Result<Vec<HostValue>, ScriptError> {
        parse(text)?
            .iter()
            .map(|statement| session.execute(statement))
            .collect()
    }

    #[test]
    fn test_parse_statement() {
        let statements = parse(
            "# setup\n\n$net = get_net \"model.toml\" \"train\"\n  net_forward $net\n",
        )
        .unwrap();
        assert_eq!(statements.len(), 2);
        assert_eq!(
            statements[0],
            Statement {
                line: 3,
                target: Some("net".into()),
                command: "get_net".into(),
                args: vec![
                    Arg::Literal(HostValue::string("model.toml")),
                    Arg::Literal(HostValue::string("train")),
                ],
            }
        );
        assert_eq!(statements[1].line, 4);
        assert_eq!(statements[1].target, None);
    }

    #[test]
    fn test_literals() {
        let statements = parse(
            r#"cmd 2.5 [1, 2, 3] ["a", 1] null {"single": {"dims": [2, 1], "data": [1, 2]}}"#,
        )
        .unwrap();
        let args: Vec<HostValue> = statements[0]
            .args
            .iter()
            .map(|arg| match arg {
                Arg::Literal(value) => value.clone(),
                Arg::Var(r) => panic!("unexpected reference {}", r),
            })
            .collect();
        assert_eq!(
            args,
            vec![
                HostValue::scalar(2.5),
                HostValue::double_row(vec![1.0, 2.0, 3.0]),
                HostValue::Cell(vec![HostValue::string("a"), HostValue::scalar(1.0)]),
                HostValue::Empty,
                HostValue::Single(SingleArray::new(vec![2, 1], vec![1.0, 2.0]).unwrap()),
            ]
        );
    }

    #[test]
    fn test_references() {
        let statements = parse("cmd $attrs.hNet_test_nets[2] $x").unwrap();
        assert_eq!(
            statements[0].args,
            vec![
                Arg::Var(Reference {
                    name: "attrs".into(),
                    path: vec![
                        Selector::Field("hNet_test_nets".into()),
                        Selector::Index(2),
                    ],
                }),
                Arg::Var(Reference {
                    name: "x".into(),
                    path: vec![],
                }),
            ]
        );
        if let Arg::Var(reference) = &statements[0].args[0] {
            assert_eq!(reference.to_string(), "$attrs.hNet_test_nets[2]");
        }
    }

    #[test]
    fn test_syntax_errors() {
        for (text, line) in [
            ("$x get_net", 1),
            ("\n$ = reset", 2),
            ("cmd $", 1),
            ("cmd $x[0]", 1),
            ("cmd \"a\"\"b\"", 1),
            ("cmd {\"triple\": {}}", 1),
            ("cmd true", 1),
            ("= reset", 1),
        ] {
            match parse(text) {
                Err(ScriptError::Syntax { line: got, .. }) => assert_eq!(got, line, "{}", text),
                other => panic!("{:?} parsed as {:?}", text, other),
            }
        }
    }

    #[test]
    fn test_render() {
        let statement = parse("$key = get_init_key").unwrap().remove(0);
        assert_eq!(
            statement.render(&HostValue::scalar(4.0)),
            Some("$key = 4".to_string())
        );
        let statement = parse("reset").unwrap().remove(0);
        assert_eq!(statement.render(&HostValue::Empty), None);
        assert_eq!(
            statement.render(&HostValue::string("x")),
            Some("ans = 'x'".to_string())
        );
    }

    #[test]
    fn test_session_binds_variables() {
        let mut session = session();
        run(&mut session, "$key = get_init_key").unwrap();
        let key = session.vars["key"].as_f64().unwrap() as u64;
        assert_eq!(key, session.ctx.epoch());

        run(&mut session, "$v = version").unwrap();
        assert!(session.vars["v"].as_str().unwrap().starts_with("netbridge-cpu"));
    }

    #[test]
    fn test_session_errors() {
        let mut session = session();
        let err = run(&mut session, "net_forward $missing").unwrap_err();
        assert_eq!(
            err,
            ScriptError::UndefinedVariable {
                line: 1,
                name: "missing".into()
            }
        );

        let err = run(&mut session, "$k = get_init_key\nnet_forward $k.field").unwrap_err();
        assert!(matches!(err, ScriptError::BadSelector { line: 2, .. }));

        let err = run(&mut session, "no_such_command").unwrap_err();
        assert_eq!(
            err,
            ScriptError::Command {
                line: 1,
                command: "no_such_command".into(),
                source: BridgeError::unknown_command("no_such_command"),
            }
        );
    }
}
