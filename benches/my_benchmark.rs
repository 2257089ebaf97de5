use criterion::{criterion_group, criterion_main, Criterion};
use monkey_interpreter::{
    ast::Program,
    evaluator,
    object::{Environment, Object},
};

fn parse(source: &str) -> Program {
    let (program, errors) = monkey_interpreter::parse(source);
    assert!(errors.is_empty(), "parse errors: {:?}", errors);
    program
}

const FIBONACCI: &str = "
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
    fibonacci(18);
    ";

const ARRAYS: &str = "
    let map = fn(arr, f) {
        let iter = fn(arr, accumulated) {
            if (len(arr) == 0) {
                accumulated
            } else {
                iter(rest(arr), push(accumulated, f(first(arr))));
            }
        };
        iter(arr, []);
    };
    let double = fn(x) { x * 2 };
    len(map([1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16], double));
    ";

fn criterion_benchmark(c: &mut Criterion) {
    let program = parse(FIBONACCI);

    c.bench_function("fib 18", |b| {
        b.iter(|| {
            let mut env = Environment::new();

            match evaluator::eval(&program, &mut env) {
                Ok(Object::Integer(2584)) => {}
                Ok(obj) => println!("Unexpected result: {}", obj),
                Err(e) => println!("Unexpected error: {}", e),
            }
        })
    });

    let program = parse(ARRAYS);

    c.bench_function("map 16", |b| {
        b.iter(|| {
            let mut env = Environment::new();

            match evaluator::eval(&program, &mut env) {
                Ok(Object::Integer(16)) => {}
                Ok(obj) => println!("Unexpected result: {}", obj),
                Err(e) => println!("Unexpected error: {}", e),
            }
        })
    });

    c.bench_function("parse fib", |b| b.iter(|| monkey_interpreter::parse(FIBONACCI)));
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
