use crate::ast::{BlockStatement, Expression, InfixOperator, PrefixOperator, Program, Statement};
use crate::object::{Builtins, Closure, Environment, EvalError, EvalResult, Object, ScopeId};
use std::io::{self, Write};
use std::rc::Rc;
use tracing::{debug, trace};

/// Evaluates a sub-expression. A `return` fired inside it (from an `if` block)
/// is handed straight back to the caller instead of being used as a value.
macro_rules! operand {
    ($eval:expr) => {
        match $eval? {
            ret @ Object::Return(_) => return Ok(ret),
            obj => obj,
        }
    };
}

/// Walks a syntax tree against an [`Environment`].
pub struct Evaluator<'e> {
    env: &'e mut Environment,
    builtins: &'e Builtins,
    out: Box<dyn Write + 'e>,
}

impl<'e> Evaluator<'e> {
    /// An evaluator whose `println` writes to stdout.
    pub fn new(env: &'e mut Environment) -> Self {
        Self::with_output(env, io::stdout())
    }

    pub fn with_output<W: Write + 'e>(env: &'e mut Environment, out: W) -> Self {
        Evaluator {
            env,
            builtins: Builtins::standard(),
            out: Box::new(out),
        }
    }

    pub fn with_builtins(mut self, builtins: &'e Builtins) -> Self {
        self.builtins = builtins;
        self
    }

    /// Runs every statement of `program` in the root scope and returns the
    /// value of the last one, stopping early on `return` or an error.
    pub fn eval_program(&mut self, program: &Program) -> EvalResult {
        let scope = self.env.root();
        let mut res = Object::Null;

        for statement in &program.statements {
            match self.eval_statement(statement, scope)? {
                Object::Return(value) => return Ok(*value),
                obj => res = obj,
            }
        }

        Ok(res)
    }

    /// Like a program, but a `return` stays wrapped so the enclosing call can see it.
    fn eval_block(&mut self, block: &BlockStatement, scope: ScopeId) -> EvalResult {
        let mut res = Object::Null;

        for statement in &block.statements {
            res = self.eval_statement(statement, scope)?;

            if let Object::Return(_) = res {
                return Ok(res);
            }
        }

        Ok(res)
    }

    fn eval_statement(&mut self, statement: &Statement, scope: ScopeId) -> EvalResult {
        match statement {
            Statement::Let(name, exp) => {
                let value = operand!(self.eval_expression(exp, scope));
                self.env.set(scope, name, value);
                Ok(Object::Null)
            }
            Statement::Return(exp) => {
                let value = operand!(self.eval_expression(exp, scope));
                Ok(Object::Return(Box::new(value)))
            }
            Statement::Expression(exp) => self.eval_expression(exp, scope),
            Statement::Block(block) => self.eval_block(block, scope),
        }
    }

    fn eval_expression(&mut self, expression: &Expression, scope: ScopeId) -> EvalResult {
        match expression {
            Expression::Identifier(name) => self.eval_identifier(name, scope),
            Expression::IntegerLiteral(v) => Ok(Object::Integer(*v)),
            Expression::Boolean(b) => Ok(Object::from_bool(*b)),
            Expression::StringLiteral(s) => Ok(Object::String(s.clone())),
            Expression::Array(elements) => self.eval_array_literal(elements, scope),
            Expression::Prefix(operator, right) => {
                let right = operand!(self.eval_expression(right, scope));
                eval_prefix_expression(*operator, right)
            }
            Expression::Infix(operator, left, right) => {
                self.eval_infix_operands(*operator, left, right, scope)
            }
            Expression::If(condition, consequence, alternative) => {
                self.eval_if_expression(condition, consequence, alternative.as_ref(), scope)
            }
            Expression::Function(literal) => Ok(Object::Function(Closure {
                literal: Rc::clone(literal),
                scope: self.env.capture(scope),
            })),
            Expression::Call(function, arguments) => {
                self.eval_call_expression(function, arguments, scope)
            }
            Expression::Index(left, index) => self.eval_index_operands(left, index, scope),
        }
    }

    fn eval_array_literal(&mut self, elements: &[Expression], scope: ScopeId) -> EvalResult {
        let mut values = Vec::with_capacity(elements.len());
        for element in elements {
            values.push(operand!(self.eval_expression(element, scope)));
        }

        Ok(Object::Array(Rc::new(values)))
    }

    fn eval_infix_operands(
        &mut self,
        operator: InfixOperator,
        left: &Expression,
        right: &Expression,
        scope: ScopeId,
    ) -> EvalResult {
        let left = operand!(self.eval_expression(left, scope));
        let right = operand!(self.eval_expression(right, scope));

        eval_infix_expression(operator, left, right)
    }

    fn eval_if_expression(
        &mut self,
        condition: &Expression,
        consequence: &BlockStatement,
        alternative: Option<&BlockStatement>,
        scope: ScopeId,
    ) -> EvalResult {
        let condition = operand!(self.eval_expression(condition, scope));

        if condition.is_truthy() {
            self.eval_block(consequence, scope)
        } else if let Some(alternative) = alternative {
            self.eval_block(alternative, scope)
        } else {
            Ok(Object::Null)
        }
    }

    fn eval_call_expression(
        &mut self,
        function: &Expression,
        arguments: &[Expression],
        scope: ScopeId,
    ) -> EvalResult {
        let function = operand!(self.eval_expression(function, scope));

        let mut args = Vec::with_capacity(arguments.len());
        for argument in arguments {
            args.push(operand!(self.eval_expression(argument, scope)));
        }

        self.apply_function(function, args)
    }

    fn eval_index_operands(
        &mut self,
        left: &Expression,
        index: &Expression,
        scope: ScopeId,
    ) -> EvalResult {
        let left = operand!(self.eval_expression(left, scope));
        let index = operand!(self.eval_expression(index, scope));

        eval_index_expression(left, index)
    }

    /// User bindings shadow builtins.
    fn eval_identifier(&self, name: &str, scope: ScopeId) -> EvalResult {
        self.env
            .get(scope, name)
            .or_else(|| self.builtins.lookup(name))
            .ok_or_else(|| EvalError::IdentifierNotFound(name.to_string()))
    }

    fn apply_function(&mut self, function: Object, args: Vec<Object>) -> EvalResult {
        match function {
            Object::Function(closure) => {
                let want = closure.literal.parameters.len();
                if args.len() != want {
                    return Err(EvalError::WrongArgumentCount {
                        got: args.len(),
                        want,
                    });
                }

                trace!(arity = want, scope = ?closure.scope.id(), "applying function");

                let frame = self.env.push_frame(&closure.scope);
                for (parameter, arg) in closure.literal.parameters.iter().zip(args) {
                    self.env.set(frame, parameter, arg);
                }

                let evaluated = self.eval_block(&closure.literal.body, frame);
                self.env.pop_frame(frame);

                Ok(unwrap_return_value(evaluated?))
            }
            Object::BuiltIn(builtin) => {
                trace!(name = builtin.name, "applying builtin");
                builtin.call(args, &mut *self.out)
            }
            other => Err(EvalError::NotCallable(other.type_name())),
        }
    }
}

fn unwrap_return_value(obj: Object) -> Object {
    match obj {
        Object::Return(value) => *value,
        obj => obj,
    }
}

fn eval_prefix_expression(operator: PrefixOperator, right: Object) -> EvalResult {
    match (operator, &right) {
        (PrefixOperator::Bang, _) => Ok(Object::from_bool(!right.is_truthy())),
        (PrefixOperator::Minus, Object::Integer(v)) => Ok(Object::Integer(v.wrapping_neg())),
        (PrefixOperator::Minus, _) => Err(EvalError::UnsupportedPrefixOperator {
            operator,
            operand: right.type_name(),
        }),
    }
}

fn eval_infix_expression(operator: InfixOperator, left: Object, right: Object) -> EvalResult {
    match (&left, &right) {
        (Object::Integer(l), Object::Integer(r)) => eval_integer_infix_expression(operator, *l, *r),
        (Object::String(l), Object::String(r)) if operator == InfixOperator::Plus => {
            Ok(Object::String(format!("{}{}", l, r)))
        }
        (Object::String(_), Object::String(_)) => Err(unsupported(operator, &left, &right)),
        _ => match operator {
            InfixOperator::Eq => Ok(Object::from_bool(left == right)),
            InfixOperator::NotEq => Ok(Object::from_bool(left != right)),
            _ => Err(unsupported(operator, &left, &right)),
        },
    }
}

fn eval_integer_infix_expression(operator: InfixOperator, left: i64, right: i64) -> EvalResult {
    let res = match operator {
        InfixOperator::Plus => Object::Integer(left.wrapping_add(right)),
        InfixOperator::Minus => Object::Integer(left.wrapping_sub(right)),
        InfixOperator::Asterisk => Object::Integer(left.wrapping_mul(right)),
        InfixOperator::Slash => {
            if right == 0 {
                return Err(EvalError::DivisionByZero);
            }
            Object::Integer(left.wrapping_div(right))
        }
        InfixOperator::Lt => Object::from_bool(left < right),
        InfixOperator::Gt => Object::from_bool(left > right),
        InfixOperator::Eq => Object::from_bool(left == right),
        InfixOperator::NotEq => Object::from_bool(left != right),
    };

    Ok(res)
}

fn unsupported(operator: InfixOperator, left: &Object, right: &Object) -> EvalError {
    EvalError::UnsupportedInfixOperator {
        operator,
        left: left.type_name(),
        right: right.type_name(),
    }
}

fn eval_index_expression(left: Object, index: Object) -> EvalResult {
    match (&left, &index) {
        (Object::Array(elements), Object::Integer(idx)) => usize::try_from(*idx)
            .ok()
            .and_then(|i| elements.get(i))
            .cloned()
            .ok_or(EvalError::IndexOutOfBounds),
        _ => Err(EvalError::UnsupportedIndex(left.type_name())),
    }
}

/// Evaluates `program` against `env`, writing `println` output to stdout.
pub fn eval(program: &Program, env: &mut Environment) -> EvalResult {
    let res = Evaluator::new(env).eval_program(program);

    if let Err(err) = &res {
        debug!(%err, "evaluation failed");
    }

    res
}

#[cfg(test)]
mod tests {
    use crate::evaluator::Evaluator;
    use crate::lexer::Lexer;
    use crate::object::builtins::BUILTINS;
    use crate::object::{Builtins, Environment, EvalError, EvalResult, Object, TRUE};
    use crate::parser::Parser;
    use std::thread;

    #[test]
    fn eval_integer_expression() {
        expect_values(vec![
            ("5", "5"),
            ("10", "10"),
            ("-5", "-5"),
            ("-10", "-10"),
            ("5 + 5 + 5 + 5 - 10", "10"),
            ("2 * 2 * 2 * 2 * 2", "32"),
            ("-50 + 100 + -50", "0"),
            ("5 * 2 + 10", "20"),
            ("5 + 2 * 10", "25"),
            ("20 + 2 * -10", "0"),
            ("50 / 2 * 2 + 10", "60"),
            ("2 * (5 + 10)", "30"),
            ("3 * 3 * 3 + 10", "37"),
            ("3 * (3 * 3) + 10", "37"),
            ("(5 + 10 * 2 + 15 / 3) * 2 + -10", "50"),
            ("7 / 2", "3"),
            ("-7 / 2", "-3"),
            ("9223372036854775807 + 1", "-9223372036854775808"),
        ]);
    }

    #[test]
    fn eval_boolean_expression() {
        expect_values(vec![
            ("true", "true"),
            ("false", "false"),
            ("1 < 2", "true"),
            ("1 > 2", "false"),
            ("1 < 1", "false"),
            ("1 > 1", "false"),
            ("1 == 1", "true"),
            ("1 != 1", "false"),
            ("1 == 2", "false"),
            ("1 != 2", "true"),
            ("true == true", "true"),
            ("false == false", "true"),
            ("true == false", "false"),
            ("true != false", "true"),
            ("false != true", "true"),
            ("(1 < 2) == true", "true"),
            ("(1 < 2) == false", "false"),
            ("(1 > 2) == true", "false"),
            ("(1 > 2) == false", "true"),
        ]);
    }

    #[test]
    fn eval_bang_expression() {
        expect_values(vec![
            ("!true", "false"),
            ("!false", "true"),
            ("!5", "false"),
            ("!!true", "true"),
            ("!!false", "false"),
            ("!!5;;", "true"),
            ("!\"\"", "false"),
            ("!if (false) { 1 }", "true"),
        ]);
    }

    #[test]
    fn eval_if_else_expressions() {
        expect_values(vec![
            ("if (true) { 10 }", "10"),
            ("if (false) { 10 }", "null"),
            ("if (1) { 10 }", "10"),
            ("if (0) { 1 } else { 2 }", "1"),
            ("if (1 < 2) { 10 }", "10"),
            ("if (1 > 2) { 10 }", "null"),
            ("if (1 > 2) { 10 } else { 20 }", "20"),
            ("if (1 < 2) { 10 } else { 20 }", "10"),
            ("if (true) { let inner = 3; }; inner", "3"),
        ]);
    }

    #[test]
    fn eval_return_statements() {
        expect_values(vec![
            ("return 10;", "10"),
            ("return 10; 9;", "10"),
            ("return 2 * 5; 9;", "10"),
            ("9; return 2 * 5; 9;", "10"),
            (
                "if (10 > 1) { if (10 > 1) { return 10; } return 1; }",
                "10",
            ),
            (
                "let f = fn(x) { if (x > 1) { return 1; } 2 }; f(5) + f(0)",
                "3",
            ),
            (
                "let f = fn() { let x = if (true) { return 7; }; 8 }; f()",
                "7",
            ),
            ("let f = fn() { 1 + if (true) { return 4; } }; f()", "4"),
        ]);
    }

    #[test]
    fn eval_let_statements() {
        expect_values(vec![
            ("let a = 5; a;", "5"),
            ("let a = 5 * 5; a;", "25"),
            ("let a = 5; let b = a; b;", "5"),
            ("let a = 5; let b = a; let c = a + b + 5; c;", "15"),
            ("let a = 5;", "null"),
            ("let a = 1; let a = a + 1; a", "2"),
        ]);
    }

    #[test]
    fn eval_functions() {
        expect_values(vec![
            ("fn(x) { x + 2; };", "fn(x) { (x + 2) }"),
            ("let identity = fn(x) { x; }; identity(5);", "5"),
            ("let identity = fn(x) { return x; }; identity(5);", "5"),
            ("let double = fn(x) { x * 2; }; double(5);", "10"),
            ("let add = fn(x, y) { x + y; }; add(5, 5);", "10"),
            ("let add = fn(x, y) { x + y; }; add(5 + 5, add(5, 5));", "20"),
            ("fn(x) { x; }(5)", "5"),
            ("fn() { }()", "null"),
            (
                "let newAdder = fn(x) { fn(y) { x + y } }; let addTwo = newAdder(2); addTwo(3);",
                "5",
            ),
            (
                "let fib = fn(n) { if (n < 2) { n } else { fib(n - 1) + fib(n - 2) } }; fib(15)",
                "610",
            ),
        ]);
    }

    #[test]
    fn scoping_is_lexical() {
        expect_values(vec![
            (
                "let x = 1; let f = fn() { x }; let g = fn(x) { f() }; g(2)",
                "1",
            ),
            ("let x = 1; let f = fn(x) { x }; f(2); x", "1"),
            ("let f = fn() { y }; let y = 9; f()", "9"),
        ]);
    }

    #[test]
    fn eval_strings_and_arrays() {
        expect_values(vec![
            (r#""Hello World!""#, "Hello World!"),
            (r#""Hello" + " " + "World!""#, "Hello World!"),
            ("[1, 2 * 2, 3 + 3]", "[1, 4, 6]"),
            ("[1, 2, 3][0]", "1"),
            ("[1, 2, 3][1]", "2"),
            ("[1, 2, 3][1 + 1];", "3"),
            ("let i = 0; [1][i];", "1"),
            ("let myArray = [1, 2, 3]; myArray[2];", "3"),
            (
                "let myArray = [1, 2, 3]; myArray[0] + myArray[1] + myArray[2];",
                "6",
            ),
            ("[[1, 2], [3]][0][1]", "2"),
            (r#"["a", [true, fn(x) { x }]]"#, "[a, [true, fn(x) { x }]]"),
        ]);
    }

    #[test]
    fn eval_equality_fallback() {
        expect_values(vec![
            ("1 == true", "false"),
            ("1 != true", "true"),
            ("true == if (false) { 1 }", "false"),
            ("if (false) { 1 } == if (false) { 2 }", "true"),
            ("[1, 2] == [1, 2]", "true"),
            ("[1, 2] != [1, 3]", "true"),
            ("let f = fn() { 1 }; f == f", "true"),
            ("fn() { 1 } == fn() { 1 }", "false"),
            ("len == len", "true"),
            ("len == first", "false"),
            (r#""1" == 1"#, "false"),
        ]);
    }

    #[test]
    fn error_handling() {
        expect_errors(vec![
            ("5 + true;", "unknown operator: INTEGER + BOOLEAN"),
            ("5 + true; 5;", "unknown operator: INTEGER + BOOLEAN"),
            ("-true", "unknown operator: -BOOLEAN"),
            ("true + false;", "unknown operator: BOOLEAN + BOOLEAN"),
            ("5; true + false; 5", "unknown operator: BOOLEAN + BOOLEAN"),
            (
                "if (10 > 1) { true + false; }",
                "unknown operator: BOOLEAN + BOOLEAN",
            ),
            (
                "if (10 > 1) { if (10 > 1) { return true + false; } return 1; }",
                "unknown operator: BOOLEAN + BOOLEAN",
            ),
            ("foobar", "identifier not found: foobar"),
            (r#""Hello" - "World""#, "unknown operator: STRING - STRING"),
            (r#""a" == "a""#, "unknown operator: STRING == STRING"),
            ("true < false", "unknown operator: BOOLEAN < BOOLEAN"),
            ("[1] + [2]", "unknown operator: ARRAY + ARRAY"),
            ("5(1)", "not a function: INTEGER"),
            ("[1, 2, 3][3]", "index out of bounds"),
            ("[1, 2, 3][-1]", "index out of bounds"),
            ("1[0]", "index operator not supported: INTEGER"),
            (r#"[1]["0"]"#, "index operator not supported: ARRAY"),
            ("10 / 0", "division by zero"),
            (
                "let f = fn(x, y) { x }; f(1)",
                "wrong number of arguments. got=1, want=2",
            ),
            ("[1, missing, 3]", "identifier not found: missing"),
            ("len(1, missing)", "identifier not found: missing"),
            ("missing(1)", "identifier not found: missing"),
            ("let x = -true; x", "unknown operator: -BOOLEAN"),
        ]);
    }

    #[test]
    fn errors_stop_argument_evaluation() {
        let mut env = Environment::new();
        let mut out = Vec::new();

        let res = eval_with(
            "len(println(1), missing, println(2))",
            &mut env,
            &mut out,
        );

        assert_eq!(
            res.map_err(|e| e.to_string()),
            Err("identifier not found: missing".to_owned())
        );
        assert_eq!(String::from_utf8(out).unwrap(), "1\n");
    }

    #[test]
    fn builtins_are_shadowable() {
        expect_values(vec![
            ("len([1, 2])", "2"),
            ("let len = fn(x) { 42 }; len([1, 2])", "42"),
            ("let f = fn(len) { len }; f(3)", "3"),
            ("let f = fn(len) { len }; f(3); len(\"abc\")", "3"),
        ]);
    }

    #[test]
    fn custom_builtin_table() {
        let builtins = Builtins::new(&BUILTINS[..1]);
        let mut env = Environment::new();
        let mut out = Vec::new();

        let (program, errors) = crate::parse("push([], 1)");
        assert!(errors.is_empty());

        let res = Evaluator::with_output(&mut env, &mut out)
            .with_builtins(&builtins)
            .eval_program(&program);
        assert_eq!(res, Err(EvalError::IdentifierNotFound("push".to_owned())));

        let (program, _) = crate::parse("len(\"abc\")");
        let res = Evaluator::with_output(&mut env, &mut out)
            .with_builtins(&builtins)
            .eval_program(&program);
        assert_eq!(res, Ok(Object::Integer(3)));
    }

    #[test]
    fn println_goes_to_output() {
        let mut env = Environment::new();
        let mut out = Vec::new();

        let res = eval_with(r#"println("a", 1 + 1); println([1])"#, &mut env, &mut out);

        assert_eq!(res, Ok(Object::Null));
        assert_eq!(String::from_utf8(out).unwrap(), "a\n2\n[1]\n");
    }

    #[test]
    fn bindings_persist_across_programs() {
        let mut env = Environment::new();
        let mut out = Vec::new();

        eval_with("let double = fn(x) { x * 2 };", &mut env, &mut out).unwrap();
        eval_with("let n = double(21);", &mut env, &mut out).unwrap();

        assert_eq!(eval_with("n", &mut env, &mut out), Ok(Object::Integer(42)));
    }

    #[test]
    fn recursion_releases_frames() {
        let mut env = Environment::new();
        let mut out = Vec::new();

        eval_with(
            "let count = fn(n) { if (n == 0) { 0 } else { 1 + count(n - 1) } }; count(30)",
            &mut env,
            &mut out,
        )
        .unwrap();

        assert_eq!(env.scope_count(), 1);
    }

    #[test]
    fn closures_keep_their_frames() {
        let mut env = Environment::new();
        let mut out = Vec::new();

        let res = eval_with(
            "let counter = fn(start) { fn() { start } }; let a = counter(1); let b = counter(2); a() + b()",
            &mut env,
            &mut out,
        );

        assert_eq!(res, Ok(Object::Integer(3)));
        assert!(env.scope_count() >= 3);
    }

    #[test]
    fn discarded_closures_are_reclaimed() {
        let mut env = Environment::new();
        let mut out = Vec::new();

        eval_with(
            "let mk = fn(x) { fn() { x } };
             let run = fn(n) { if (n == 0) { 0 } else { mk(n); run(n - 1) } };",
            &mut env,
            &mut out,
        )
        .unwrap();

        for _ in 0..10 {
            assert_eq!(eval_with("run(50)", &mut env, &mut out), Ok(Object::Integer(0)));
            assert!(env.scope_count() <= 256, "{} scopes", env.scope_count());
        }

        env.sweep();
        assert_eq!(env.scope_count(), 1);
    }

    #[test]
    fn self_referencing_closures_are_swept() {
        let mut env = Environment::new();
        let mut out = Vec::new();

        eval_with(
            "let mk = fn() { let g = fn() { g }; g }; mk(); mk(); let keep = mk();",
            &mut env,
            &mut out,
        )
        .unwrap();
        assert_eq!(env.scope_count(), 4);

        env.sweep();
        assert_eq!(env.scope_count(), 2);
        assert_eq!(eval_with("keep() == keep", &mut env, &mut out), Ok(TRUE));
    }

    #[test]
    fn deep_recursion() {
        let handle = thread::Builder::new()
            .stack_size(64 * 1024 * 1024)
            .spawn(|| {
                let mut env = Environment::new();
                let mut out = Vec::new();

                let result = eval_with(
                    "let c = fn(n) { if (n == 0) { 0 } else { 1 + c(n - 1) } }; c(1000)",
                    &mut env,
                    &mut out,
                );

                assert_eq!(result, Ok(Object::Integer(1000)));
            })
            .unwrap();

        handle.join().unwrap();
    }

    fn expect_values(tests: Vec<(&str, &str)>) {
        for (input, expected) in &tests {
            match eval_input(input) {
                Ok(obj) => {
                    assert_eq!(obj.to_string(), expected.to_string(), "for `{}`", input);
                }
                Err(err) => {
                    panic!(
                        "expected `{}`, but got error={} for `{}`",
                        expected, err, input
                    );
                }
            }
        }
    }

    fn expect_errors(tests: Vec<(&str, &str)>) {
        for (input, expected) in &tests {
            match eval_input(input) {
                Ok(obj) => {
                    panic!(
                        "expected error `{}`, but got `{}` for `{}`",
                        expected, obj, input
                    );
                }
                Err(err) => {
                    assert_eq!(err.to_string(), expected.to_string(), "for `{}`", input);
                }
            }
        }
    }

    fn eval_with(input: &str, env: &mut Environment, out: &mut Vec<u8>) -> EvalResult {
        let lexer = Lexer::new(input);
        let mut parser = Parser::new(lexer);

        let program = parser.parse_program();
        assert!(
            parser.errors().is_empty(),
            "parser errors for `{}`: {:?}",
            input,
            parser.errors()
        );

        Evaluator::with_output(env, out).eval_program(&program)
    }

    fn eval_input(input: &str) -> EvalResult {
        let mut env = Environment::new();
        let mut out = Vec::new();

        eval_with(input, &mut env, &mut out)
    }
}
