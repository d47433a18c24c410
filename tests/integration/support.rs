use std::fs;
use std::path::{Path, PathBuf};

use coupler::params::Parameters;
use coupler::plugin::{GenericPlugin, RunRequest};
use coupler::{ResultRecord, WorkflowContext};

pub fn write_template(dir: &Path, name: &str, source: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, source).unwrap();
    path
}

/// `cat` over a template holding a single `{{ variable }}`
pub fn cat_plugin(dir: &Path) -> GenericPlugin {
    let template = write_template(dir, "input_template", "{{ variable }}");
    GenericPlugin::new(template, "cat").unwrap().with_name("cat")
}

/// Three `cat` runs named `var=10`, `var=20`, `var=30`
pub fn populate(ctx: &WorkflowContext, template_dir: &Path) -> Vec<ResultRecord> {
    let mut plugin = cat_plugin(template_dir);
    let mut params = Parameters::new();
    [10, 20, 30]
        .into_iter()
        .map(|var| {
            params.insert("variable", var);
            ctx.run(
                &mut plugin,
                Some(&params),
                &RunRequest::named(format!("var={}", var)),
            )
            .unwrap()
        })
        .collect()
}
