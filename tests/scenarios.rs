use num_bigint::BigInt;

use fint::asm::{assemble, Label};
use fint::codegen::{Arg, CompileOptions, Compiled, Emitter, Selector};
use fint::layout::{tuple_elements, ScopeRecord};
use fint::scope::ScopeArena;
use fint::vm::scheduler::{Message, Scheduler};
use fint::vm::{run_scripted, Machine, Scripted, VmError};

fn build(source: &str) -> Compiled {
    build_with(source, &CompileOptions::default())
}

fn build_with(source: &str, options: &CompileOptions) -> Compiled {
    fint::compile_source(source, options).unwrap_or_else(|e| panic!("{source}: {e}"))
}

fn big(values: &[i64]) -> Vec<BigInt> {
    values.iter().map(|&v| BigInt::from(v)).collect()
}

fn run(source: &str, inputs: &[i64]) -> (Machine, Vec<BigInt>) {
    let compiled = build(source);
    run_scripted(compiled.words(), big(inputs)).unwrap()
}

const DIVIDE: &str = "\
divide = a => b => lt a b (u => 0) (u => succ (divide (sub a b) b)) 0
main = print (divide (input 0) (input 0))
";

const SHADOWING: &str = "\
k = 1
main = do (print k) (print inner)
  where
    inner = k
      where
        k = 43
";

const CHAINED_LOCALS: &str = "\
bonus = 1
low = n => add n bonus
  where
    bonus = 100
high = n => add n bonus
  where
    bonus = 200
main = do (print (low 1)) (print (high (low 2))) (print bonus)
";

// ---- End-to-end programs ----

#[test]
fn global_literal_lands_in_its_slot() {
    let compiled = build("x = 5");
    let (machine, out) = run_scripted(compiled.words(), Vec::new()).unwrap();
    assert!(out.is_empty());
    assert!(machine.is_halted());
    let slot = compiled.global_slot("x").unwrap();
    assert_eq!(machine.memory().get(slot as u64), BigInt::from(5));
    let globals = ScopeRecord::at(machine.memory(), compiled.global_scope().unwrap() as u64);
    assert_eq!(globals.slot(0), BigInt::from(5));
}

#[test]
fn curried_add_through_print() {
    let (_, out) = run("main = print (add 2 3)", &[]);
    assert_eq!(out, big(&[5]));
}

#[test]
fn tuple_indexing() {
    let (_, out) = run("t = [1, 2, 3]\na = print (get 0 t)\nb = print (get 2 t)", &[]);
    assert_eq!(out, big(&[1, 3]));
}

#[test]
fn tuple_literal_layout_in_memory() {
    let compiled = build("t = [4, [], 6]");
    let (machine, _) = run_scripted(compiled.words(), Vec::new()).unwrap();
    let t = machine.memory().get(compiled.global_slot("t").unwrap() as u64);
    let elements = tuple_elements(machine.memory(), t.try_into().unwrap()).unwrap();
    assert_eq!(elements.len(), 3);
    assert_eq!(elements[0], BigInt::from(4));
    assert_eq!(elements[2], BigInt::from(6));
    let inner = tuple_elements(machine.memory(), (&elements[1]).try_into().unwrap()).unwrap();
    assert!(inner.is_empty());
}

#[test]
fn empty_tuple_is_one_heap_word() {
    let options = CompileOptions { ram_begin: 7000, ..CompileOptions::default() };
    let compiled = build_with("t = []", &options);
    let (machine, _) = run_scripted(compiled.words(), Vec::new()).unwrap();
    let cursor = compiled.assembly.address(Label::RAM_POINTER).unwrap() as u64;
    // 7000 holds the assignment's scope record header; the tuple follows
    assert_eq!(machine.memory().get(cursor), BigInt::from(7002));
    assert_eq!(machine.memory().get(7001), BigInt::from(0));
    let t = compiled.global_slot("t").unwrap() as u64;
    assert_eq!(machine.memory().get(t), BigInt::from(7001));
}

#[test]
fn recursive_division() {
    let (_, out) = run(DIVIDE, &[17, 5]);
    assert_eq!(out, big(&[3]));
}

#[test]
fn recursive_division_under_every_seed() {
    for seed in 0..6 {
        let options = CompileOptions { seed: Some(seed), ..CompileOptions::default() };
        let compiled = build_with(DIVIDE, &options);
        let (_, out) = run_scripted(compiled.words(), big(&[17, 5])).unwrap();
        assert_eq!(out, big(&[3]), "seed {seed}");
    }
}

#[test]
fn inner_where_shadows_outer_binding() {
    let (_, out) = run(SHADOWING, &[]);
    assert_eq!(out, big(&[1, 43]));
}

#[test]
fn chained_calls_see_their_own_where_locals() {
    let (_, out) = run(CHAINED_LOCALS, &[]);
    assert_eq!(out, big(&[101, 302, 1]));
}

#[test]
fn negative_address_halts_the_machine() {
    let mut e = Emitter::new(ScopeArena::new(), Selector::deterministic());
    let mut items = e.move_stack(-10).unwrap();
    items.extend(e.write(Arg::rel(3)).unwrap());
    items.extend(e.halt());
    let image = assemble(items, &e.labels).unwrap();

    let mut machine = Machine::new(&image.words);
    let err = machine.run(&mut Scripted::new(Vec::new())).unwrap_err();
    assert!(matches!(err, VmError::NegativeAddress { ref address } if *address == BigInt::from(-7)));
    assert!(machine.is_halted());
}

// ---- Properties ----

#[test]
fn default_builds_are_reproducible() {
    assert_eq!(build(SHADOWING).words(), build(SHADOWING).words());
    let seeded = CompileOptions { seed: Some(42), ..CompileOptions::default() };
    assert_eq!(build_with(DIVIDE, &seeded).words(), build_with(DIVIDE, &seeded).words());
}

#[test]
fn calls_leave_the_frame_where_they_found_it() {
    for source in [DIVIDE, SHADOWING, CHAINED_LOCALS, "t = [add 1 2, [3], x => x]\nmain = print (fst t)"] {
        let compiled = build(source);
        let (machine, _) = run_scripted(compiled.words(), big(&[9, 4])).unwrap();
        let base = compiled.stack_begin().unwrap() + 2;
        assert_eq!(*machine.relative_base(), BigInt::from(base), "{source}");
    }
}

#[test]
fn every_label_is_placed_in_bounds() {
    let compiled = build(DIVIDE);
    let symbols = compiled.assembly.symbols();
    assert!(!symbols.is_empty());
    assert!(symbols.iter().all(|&(_, addr)| addr < compiled.assembly.len()));
}

#[test]
fn closed_programs_always_resolve() {
    for source in [DIVIDE, SHADOWING, "f = x => y => z => mult x (add y z)\nmain = f 1 2 3"] {
        assert!(fint::compile_source(source, &CompileOptions::default()).is_ok(), "{source}");
    }
}

#[test]
fn compiled_programs_chain_through_the_scheduler() {
    let double = build("main = print (mult 2 (input 0))");
    let machines = vec![Machine::new(double.words()), Machine::new(double.words())];
    let mut scheduler = Scheduler::new(machines);
    let mut step = 0;
    let mut result = None;
    let mut driver = |received: Option<BigInt>| {
        step += 1;
        match step {
            1 => Some(Message::Provide { target: 0, value: BigInt::from(21) }),
            2 => Some(Message::Receive { target: 0 }),
            3 => Some(Message::Provide { target: 1, value: received? }),
            4 => Some(Message::Receive { target: 1 }),
            _ => {
                result = received;
                None
            }
        }
    };
    scheduler.run(&mut driver).unwrap();
    assert_eq!(result, Some(BigInt::from(84)));
}
