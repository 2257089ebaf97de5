use super::{EvalError, EvalResult, Object};
use indexmap::IndexMap;
use std::fmt;
use std::io::Write;
use std::rc::Rc;
use std::sync::OnceLock;

/// Signature of a native function. `out` is where `println` writes.
pub type BuiltinFn = fn(Vec<Object>, &mut dyn Write) -> EvalResult;

#[derive(Clone, Copy)]
pub struct Builtin {
    pub name: &'static str,
    func: BuiltinFn,
}

impl Builtin {
    pub fn call(&self, args: Vec<Object>, out: &mut dyn Write) -> EvalResult {
        (self.func)(args, out)
    }
}

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Builtin").field("name", &self.name).finish()
    }
}

/// BUILTINS lists the native functions in a stable order.
pub const BUILTINS: &[Builtin] = &[
    Builtin {
        name: "len",
        func: len,
    },
    Builtin {
        name: "first",
        func: first,
    },
    Builtin {
        name: "last",
        func: last,
    },
    Builtin {
        name: "rest",
        func: rest,
    },
    Builtin {
        name: "push",
        func: push,
    },
    Builtin {
        name: "println",
        func: println,
    },
];

/// Name to native function table consulted after the environment chain.
#[derive(Debug)]
pub struct Builtins {
    table: IndexMap<&'static str, Builtin>,
}

impl Builtins {
    pub fn new(builtins: &[Builtin]) -> Self {
        Builtins {
            table: builtins.iter().map(|b| (b.name, *b)).collect(),
        }
    }

    /// The standard table, built on first use.
    pub fn standard() -> &'static Builtins {
        static STANDARD: OnceLock<Builtins> = OnceLock::new();
        STANDARD.get_or_init(|| Builtins::new(BUILTINS))
    }

    pub fn lookup(&self, name: &str) -> Option<Object> {
        self.table.get(name).map(|b| Object::BuiltIn(*b))
    }
}

fn assert_argument_count(want: usize, args: &[Object]) -> Result<(), EvalError> {
    if args.len() != want {
        return Err(EvalError::WrongArgumentCount {
            got: args.len(),
            want,
        });
    }

    Ok(())
}

fn expected_array(function: &'static str, got: &Object) -> EvalError {
    EvalError::ExpectedArray {
        function,
        got: got.type_name(),
    }
}

fn len(args: Vec<Object>, _: &mut dyn Write) -> EvalResult {
    assert_argument_count(1, &args)?;

    match &args[0] {
        Object::String(value) => Ok(Object::Integer(value.chars().count() as i64)),
        Object::Array(elements) => Ok(Object::Integer(elements.len() as i64)),
        other => Err(EvalError::UnsupportedArgument {
            function: "len",
            got: other.type_name(),
        }),
    }
}

fn first(args: Vec<Object>, _: &mut dyn Write) -> EvalResult {
    assert_argument_count(1, &args)?;

    match &args[0] {
        Object::Array(elements) => Ok(elements.first().cloned().unwrap_or(Object::Null)),
        other => Err(expected_array("first", other)),
    }
}

fn last(args: Vec<Object>, _: &mut dyn Write) -> EvalResult {
    assert_argument_count(1, &args)?;

    match &args[0] {
        Object::Array(elements) => Ok(elements.last().cloned().unwrap_or(Object::Null)),
        other => Err(expected_array("last", other)),
    }
}

fn rest(args: Vec<Object>, _: &mut dyn Write) -> EvalResult {
    assert_argument_count(1, &args)?;

    match &args[0] {
        Object::Array(elements) => Ok(if elements.is_empty() {
            Object::Null
        } else {
            Object::Array(Rc::new(elements[1..].to_vec()))
        }),
        other => Err(expected_array("rest", other)),
    }
}

fn push(args: Vec<Object>, _: &mut dyn Write) -> EvalResult {
    assert_argument_count(2, &args)?;

    match (&args[0], &args[1]) {
        (Object::Array(elements), value) => {
            let mut new_elements = Vec::with_capacity(elements.len() + 1);
            new_elements.extend(elements.iter().cloned());
            new_elements.push(value.clone());
            Ok(Object::Array(Rc::new(new_elements)))
        }
        (other, _) => Err(expected_array("push", other)),
    }
}

fn println(args: Vec<Object>, out: &mut dyn Write) -> EvalResult {
    for arg in args {
        writeln!(out, "{}", arg).map_err(|e| EvalError::Output(e.to_string()))?;
    }

    Ok(Object::Null)
}
