//! Python shim: imports the entrypoint module, invokes the named function,
//! and prints the sentinel line via `json.dumps`.

pub fn generate(rel_entrypoint: &str, entrypoint_func: &str) -> String {
    let module_name = rel_entrypoint.trim_end_matches(".py").replace('/', ".");
    format!(
        r#"import importlib
import json
import sys

# python puts the shim's own directory on sys.path[0], not the task root;
# insert the task root explicitly so the entrypoint module resolves.
sys.path.insert(0, "/airplane")

def main():
    params_json = sys.argv[1] if len(sys.argv) > 1 else "{{}}"
    params = json.loads(params_json)

    mod = importlib.import_module("{module}")
    func = getattr(mod, "{func}", None)
    if func is None or not callable(func):
        print(f"no function named {func} in entrypoint", file=sys.stderr)
        sys.exit(1)

    try:
        result = func(params)
        print("airplane_output_set:" + json.dumps(result))
    except Exception as err:
        print(str(err), file=sys.stderr)
        sys.exit(1)

if __name__ == "__main__":
    main()
"#,
        module = module_name,
        func = entrypoint_func,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_python_shim() {
        let shim = generate("tasks/my_task.py", "run");
        assert!(shim.contains("airplane_output_set:"));
        assert!(shim.contains("tasks.my_task"));
        assert!(shim.contains("\"run\""));
        assert!(shim.contains("json.dumps"));
    }
}
