//! Node shim: `require`s the bundled entrypoint, invokes the named export
//! (or its `__airplane.baseFunc` if the export carries that marker), and
//! prints the sentinel line `airplane_output_set:<json>` on success.

/// Render the Node shim source. `rel_entrypoint` is relative to
/// `/airplane/.airplane/dist/`; `entrypoint_func` is the named export.
pub fn generate(rel_entrypoint: &str, entrypoint_func: &str) -> String {
    format!(
        r#"const path = require('path');

async function main() {{
  const paramsJSON = process.argv[2] || '{{}}';
  const params = JSON.parse(paramsJSON);

  const mod = require(path.join(__dirname, {entrypoint:?}));
  const exported = mod[{func:?}];
  if (typeof exported !== 'function') {{
    console.error(`no export named ${{{func:?}}} in entrypoint`);
    process.exit(1);
  }}

  const target = (exported.__airplane && typeof exported.__airplane.baseFunc === 'function')
    ? exported.__airplane.baseFunc
    : exported;

  try {{
    const result = await target(params);
    console.log('airplane_output_set:' + JSON.stringify(result === undefined ? null : result));
  }} catch (err) {{
    console.error(err && err.message ? err.message : String(err));
    process.exit(1);
  }}
}}

main();
"#,
        entrypoint = rel_entrypoint,
        func = entrypoint_func,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_contains_sentinel_and_names() {
        let shim = generate("task.js", "runTask");
        assert!(shim.contains("airplane_output_set:"));
        assert!(shim.contains("\"task.js\""));
        assert!(shim.contains("\"runTask\""));
        assert!(shim.contains("__airplane"));
        assert!(shim.contains("baseFunc"));
    }
}
