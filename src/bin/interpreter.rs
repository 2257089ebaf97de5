use monkey_interpreter::{evaluator, object::Environment};

fn main() {
    let (program, errors) = monkey_interpreter::parse(
        "
    let fibonacci = fn(x) {
		if (x == 0) {
			0
		} else {
			if (x == 1) {
				return 1;
			} else {
				fibonacci(x - 1) + fibonacci(x - 2);
			}
		}
	};
    fibonacci(27);
    ",
    );
    if !errors.is_empty() {
        println!("Unexpected parse errors: {:?}", errors);
        return;
    }

    let mut env = Environment::new();

    match evaluator::eval(&program, &mut env) {
        Ok(obj) => println!("Result: {}", obj),
        Err(e) => println!("Unexpected error: {}", e),
    }
}
