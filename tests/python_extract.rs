use cartograph::analyzer::{run_extraction, AnalyzeOptions};
use cartograph::model::{NodeKind, RelType};
use std::process::Command;

fn python_available() -> bool {
    Command::new("python3")
        .arg("--version")
        .output()
        .map(|out| out.status.success())
        .unwrap_or(false)
}

#[test]
fn function_class_method_parameters_and_calls() {
    if !python_available() {
        eprintln!("python3 not available, skipping");
        return;
    }

    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("demo.py"),
        r#"def greet(name):
    print(name)

class SimpleClass:
    def __init__(self, value):
        self.value = value

    def get_value(self):
        return self.value

instance = SimpleClass(5)
greet('x')
"#,
    )
    .unwrap();

    let result = run_extraction(dir.path(), &AnalyzeOptions::default()).unwrap();

    let functions: Vec<&cartograph::model::Node> = result
        .nodes
        .iter()
        .filter(|n| n.kind == NodeKind::PythonFunction)
        .collect();
    assert_eq!(functions.len(), 1);
    assert_eq!(functions[0].name, "greet");

    let classes: Vec<&cartograph::model::Node> = result
        .nodes
        .iter()
        .filter(|n| n.kind == NodeKind::PythonClass)
        .collect();
    assert_eq!(classes.len(), 1);
    assert_eq!(classes[0].name, "SimpleClass");

    let methods: Vec<&str> = result
        .nodes
        .iter()
        .filter(|n| n.kind == NodeKind::PythonMethod)
        .map(|n| n.name.as_str())
        .collect();
    assert!(methods.contains(&"__init__"));
    assert!(methods.contains(&"get_value"));

    let parameters: Vec<&str> = result
        .nodes
        .iter()
        .filter(|n| n.kind == NodeKind::PythonParameter)
        .map(|n| n.name.as_str())
        .collect();
    assert_eq!(parameters.len(), 4, "name, self, value, self");
    assert!(parameters.contains(&"name"));
    assert!(parameters.contains(&"value"));

    let calls: Vec<&cartograph::model::Relationship> = result
        .relationships
        .iter()
        .filter(|r| r.rel_type == RelType::PythonCalls)
        .collect();
    assert!(calls.len() >= 2, "print + greet calls, got {}", calls.len());
    assert!(calls.iter().all(|c| c.is_placeholder()));

    let greet = functions[0];
    let file = result
        .nodes
        .iter()
        .find(|n| n.kind == NodeKind::File)
        .unwrap();
    // print() is called from inside greet; greet('x') from module level.
    assert!(calls.iter().any(|c| c.source_id == greet.entity_id));
    assert!(calls.iter().any(|c| c.source_id == file.entity_id));

    assert!(result
        .relationships
        .iter()
        .any(|r| r.rel_type == RelType::PythonHasMethod));
    assert!(result
        .relationships
        .iter()
        .any(|r| r.rel_type == RelType::PythonDefinesClass));
    assert!(result
        .nodes
        .iter()
        .any(|n| n.kind == NodeKind::PythonVariable && n.name == "instance"));
}

#[test]
fn imports_create_module_placeholders() {
    if !python_available() {
        eprintln!("python3 not available, skipping");
        return;
    }

    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("uses_os.py"),
        "import os\nfrom json import dumps\n\nprint(os.sep)\n",
    )
    .unwrap();

    let result = run_extraction(dir.path(), &AnalyzeOptions::default()).unwrap();
    let modules: Vec<&str> = result
        .nodes
        .iter()
        .filter(|n| n.kind == NodeKind::PythonModule)
        .map(|n| n.name.as_str())
        .collect();
    assert!(modules.contains(&"os"));
    assert!(modules.contains(&"json"));
    assert_eq!(
        result
            .relationships
            .iter()
            .filter(|r| r.rel_type == RelType::PythonImports)
            .count(),
        2
    );
}

#[test]
fn syntax_errors_drop_the_file_not_the_run() {
    if !python_available() {
        eprintln!("python3 not available, skipping");
        return;
    }

    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("broken.py"), "def broken(:\n").unwrap();
    std::fs::write(dir.path().join("fine.py"), "def fine():\n    pass\n").unwrap();

    let result = run_extraction(dir.path(), &AnalyzeOptions::default()).unwrap();
    assert_eq!(result.skipped, 1);
    assert!(result
        .nodes
        .iter()
        .any(|n| n.kind == NodeKind::PythonFunction && n.name == "fine"));
    assert!(!result.nodes.iter().any(|n| n.name == "broken"));
}
