//! Shell shim: parses `key=value` arguments, exports each as
//! `PARAM_{KEY}=value` (key uppercased), then `exec`s the user command.

pub fn generate(user_entrypoint: &str) -> String {
    format!(
        r#"#!/bin/sh
set -e

for arg in "$@"; do
  case "$arg" in
    *=*)
      key=$(echo "${{arg%%=*}}" | tr '[:lower:]' '[:upper:]')
      value="${{arg#*=}}"
      export "PARAM_${{key}}=${{value}}"
      ;;
  esac
done

exec {entrypoint} "$@"
"#,
        entrypoint = user_entrypoint
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_shell_shim() {
        let shim = generate("./run.sh");
        assert!(shim.contains("PARAM_"));
        assert!(shim.contains("exec ./run.sh"));
        assert!(shim.starts_with("#!/bin/sh"));
    }
}
