//! View Dockerfile recipe (§4.3 "View recipe"): a two-stage build. Stage 1
//! installs Node, installs dependencies, bundles each view entrypoint into an
//! `index.html`/`main.tsx`/`vite.config.ts` triple via an embedded generator
//! script, then runs the front-end build tool. Stage 2 is `FROM scratch`
//! holding only the built static assets.

use crate::dockerfile::node::{infer_package_manager, install_command};
use std::path::Path;

use super::builder::DockerfileBuilder;

pub struct ViewBuildInput<'a> {
    pub root: &'a Path,
    /// Relative entrypoints for every view sharing this build context
    /// (bundle builds may co-locate more than one `.view.tsx`).
    pub rel_entrypoints: &'a [String],
    pub build_command: Option<&'a str>,
    pub build_dir: Option<&'a str>,
    pub build_arg_keys: &'a [String],
}

const GENERATOR_SCRIPT: &str = r#"const fs = require('fs');
const path = require('path');

const entrypoints = process.argv.slice(2);
for (const entrypoint of entrypoints) {
  const name = path.basename(entrypoint).replace(/\.view\.tsx$/, '');
  const dir = path.join('.airplane', 'views', name);
  fs.mkdirSync(dir, { recursive: true });

  fs.writeFileSync(
    path.join(dir, 'main.tsx'),
    `import { createRoot } from 'react-dom/client';\nimport View from '${path.relative(dir, entrypoint)}';\n\ncreateRoot(document.getElementById('root')).render(<View />);\n`
  );
  fs.writeFileSync(
    path.join(dir, 'index.html'),
    `<!doctype html>\n<html>\n  <body>\n    <div id="root"></div>\n    <script type="module" src="./main.tsx"></script>\n  </body>\n</html>\n`
  );
  fs.writeFileSync(
    path.join(dir, 'vite.config.ts'),
    `import { defineConfig } from 'vite';\nimport react from '@vitejs/plugin-react';\n\nexport default defineConfig({ plugins: [react()] });\n`
  );
}
"#;

pub fn generate(input: &ViewBuildInput) -> String {
    let mut b = DockerfileBuilder::new();

    b.raw("# syntax=docker/dockerfile:1.7").raw("# platform=linux/amd64");
    b.from_image("node:22-alpine", Some("view-build"));

    b.arg("BUILD_NPM_RC", None);
    b.arg("BUILD_NPM_TOKEN", None);
    for key in input.build_arg_keys {
        b.arg(key, None);
    }
    b.run("[ -n \"$BUILD_NPM_RC\" ] && printf '%s' \"$BUILD_NPM_RC\" > /root/.npmrc || true");

    b.workdir("/airplane");

    let pm = infer_package_manager(input.root, None);
    b.copy(".", "/airplane");
    b.run(install_command(pm));

    b.write_file("/airplane/.airplane/generate-view.js", GENERATOR_SCRIPT, false);
    let entrypoint_args = input.rel_entrypoints.join(" ");
    b.run(format!("node .airplane/generate-view.js {entrypoint_args}"));

    let build_command = input.build_command.unwrap_or("npx vite build");
    b.run(build_command);

    let build_dir = input.build_dir.unwrap_or("dist");

    b.from_image("scratch", Some("static"));
    b.copy_from("view-build", format!("/airplane/{build_dir}"), "/");

    b.render()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_two_stage_build() {
        let dir = tempdir().unwrap();
        let input = ViewBuildInput {
            root: dir.path(),
            rel_entrypoints: &["app.view.tsx".to_string()],
            build_command: None,
            build_dir: None,
            build_arg_keys: &[],
        };
        let dockerfile = generate(&input);
        assert!(dockerfile.contains("FROM node:22-alpine AS view-build"));
        assert!(dockerfile.contains("FROM scratch AS static"));
        assert!(dockerfile.contains("COPY --from=view-build /airplane/dist /"));
        assert!(dockerfile.contains("generate-view.js app.view.tsx"));
    }

    #[test]
    fn test_custom_build_command_and_dir() {
        let dir = tempdir().unwrap();
        let input = ViewBuildInput {
            root: dir.path(),
            rel_entrypoints: &["app.view.tsx".to_string()],
            build_command: Some("npm run build"),
            build_dir: Some("build"),
            build_arg_keys: &[],
        };
        let dockerfile = generate(&input);
        assert!(dockerfile.contains("RUN npm run build"));
        assert!(dockerfile.contains("/airplane/build /"));
    }
}
