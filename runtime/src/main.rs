use regstack::bytecode::{assemble, listing};
use regstack::runtime::RuntimeConfig;
use regstack::vm::{Machine, StackMachine};
use regstack::{MachineKind, ProgramImage, Runtime, VERSION};

// 10! computed with a countdown loop, result left on the operand stack
const DEMO_SOURCE: &str = "
    push 1 push 0 push 0 store
    push 10 push 1 push 0 store
    push 1 push 0 load push 0 push 0 load mul push 0 push 0 store
    push 1 push 1 push 0 load sub push 1 push 0 store
    push 1 push 0 load push -79 cjump
    push 0 push 0 load halt
";

fn main() {
    println!("regstack runtime v{}", VERSION);

    let table = match StackMachine::instruction_table() {
        Ok(table) => table,
        Err(e) => {
            eprintln!("Invalid instruction table: {}", e);
            return;
        }
    };
    let code = match assemble(DEMO_SOURCE, &table) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Failed to assemble demo program: {}", e);
            return;
        }
    };
    if let Ok(text) = listing(&code, &table) {
        print!("{}", text);
    }

    let image = ProgramImage::new("demo", MachineKind::Stack, code);
    match image.save("demo.rsvm") {
        Ok(_) => println!("Created demo image: demo.rsvm"),
        Err(e) => {
            eprintln!("Failed to create demo image: {}", e);
            return;
        }
    }

    let runtime = match Runtime::with_config(RuntimeConfig::default().with_debug_mode(true)) {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to initialize the runtime: {}", e);
            return;
        }
    };

    println!("\nExecuting demo.rsvm...");
    match runtime.execute_file("demo.rsvm") {
        Ok(state) => println!("Execution completed with result: {:?}", state.result()),
        Err(e) => eprintln!("Execution failed: {}", e),
    }
}
