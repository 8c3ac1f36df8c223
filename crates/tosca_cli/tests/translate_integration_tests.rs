//! End-to-end tests over the single-instance WordPress template.

use std::fs;
use std::path::PathBuf;

use tempfile::tempdir;

use tosca_cli::pipeline::{self, PipelineOptions};
use tosca_model::{Resolver, TemplateModel, Validator};

fn data_file(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/data")
        .join(name)
}

fn wordpress_options() -> PipelineOptions {
    PipelineOptions {
        definitions: vec![data_file("wordpress_custom_types.yaml")],
        rules: None,
        strict: false,
    }
}

#[test]
fn test_wordpress_resolution_and_inputs() {
    let options = wordpress_options();
    let registry = pipeline::build_registry(&options.definitions).unwrap();
    let document =
        pipeline::load_document(&data_file("tosca_single_instance_wordpress.yaml")).unwrap();
    let model = TemplateModel::parse(&document, &registry).unwrap();

    assert_eq!(
        model.inputs["db_port"].description.as_deref(),
        Some("Port for the MySQL database.")
    );
    assert_eq!(model.node_templates.len(), 5);

    let graph = Resolver::resolve(model, &registry).unwrap();

    // Exactly one HostedOn edge from mysql_database, and it lands on
    // mysql_dbms via the database's host requirement.
    let database_hosted: Vec<_> = graph
        .relationships
        .iter()
        .filter(|r| {
            r.source == "mysql_database" && r.type_name == "tosca.relationships.HostedOn"
        })
        .collect();
    assert_eq!(database_hosted.len(), 1);
    assert_eq!(database_hosted[0].target, "mysql_dbms");
    assert_eq!(database_hosted[0].requirement, "host");

    // The wordpress application connects to the database endpoint.
    let connects: Vec<_> = graph
        .relationships
        .iter()
        .filter(|r| r.type_name == "tosca.relationships.ConnectsTo")
        .collect();
    assert_eq!(connects.len(), 1);
    assert_eq!(connects[0].source, "wordpress");
    assert_eq!(connects[0].target, "mysql_database");
    assert_eq!(connects[0].capability, "database_endpoint");

    // The template validates cleanly.
    let report = Validator::validate(&graph, &registry);
    assert!(report.is_empty(), "unexpected findings: {:?}", report.findings);
}

#[test]
fn test_wordpress_translates_to_hot() {
    let run = pipeline::translate_template(
        &data_file("tosca_single_instance_wordpress.yaml"),
        &wordpress_options(),
    )
    .unwrap();
    assert!(run.succeeded());
    let hot = run.hot.unwrap();

    // Exactly one output, and it is the website URL.
    assert_eq!(hot.outputs.len(), 1);
    assert!(hot.outputs.contains_key("website_url"));

    // One server, four software nodes expanded to deployment + config.
    assert_eq!(hot.resources.len(), 9);
    assert_eq!(hot.resources["server"].resource_type, "OS::Nova::Server");
    assert_eq!(
        hot.resources["wordpress"].resource_type,
        "OS::Heat::SoftwareDeployment"
    );
    assert_eq!(
        hot.resources["wordpress_config"].resource_type,
        "OS::Heat::SoftwareConfig"
    );
    assert_eq!(
        hot.resources["wordpress"].depends_on,
        vec!["webserver".to_string(), "mysql_database".to_string()]
    );
    assert_eq!(
        hot.resources["mysql_dbms"].depends_on,
        vec!["server".to_string()]
    );

    // All six declared inputs become parameters, in declaration order.
    let parameter_names: Vec<&String> = hot.parameters.keys().collect();
    assert_eq!(
        parameter_names,
        vec!["cpus", "db_name", "db_user", "db_pwd", "db_root_pwd", "db_port"]
    );
}

#[test]
fn test_wordpress_yaml_roundtrip() {
    let run = pipeline::translate_template(
        &data_file("tosca_single_instance_wordpress.yaml"),
        &wordpress_options(),
    )
    .unwrap();
    let hot = run.hot.unwrap();

    let dir = tempdir().unwrap();
    let out_path = dir.path().join("wordpress_hot.yaml");
    fs::write(&out_path, serde_yaml::to_string(&hot).unwrap()).unwrap();

    // Reparse the serialized document and check the section shapes.
    let raw = fs::read_to_string(&out_path).unwrap();
    let doc: serde_yaml::Value = serde_yaml::from_str(&raw).unwrap();

    assert_eq!(
        doc["heat_template_version"].as_str(),
        Some("2013-05-23")
    );
    assert!(doc["description"]
        .as_str()
        .unwrap()
        .contains("wordpress, web server and mysql"));

    // Numeric literals survive as numbers, not quoted strings.
    assert_eq!(doc["parameters"]["db_port"]["default"].as_i64(), Some(3366));
    assert_eq!(
        doc["parameters"]["db_port"]["description"].as_str(),
        Some("Port for the MySQL database.")
    );

    let resources = doc["resources"].as_mapping().unwrap();
    assert_eq!(resources.len(), 9);
    assert_eq!(
        doc["resources"]["server"]["type"].as_str(),
        Some("OS::Nova::Server")
    );

    let outputs = doc["outputs"].as_mapping().unwrap();
    assert_eq!(outputs.len(), 1);
    let url_value = &doc["outputs"]["website_url"]["value"];
    let get_attr = url_value["get_attr"].as_sequence().unwrap();
    assert_eq!(get_attr[0].as_str(), Some("server"));
    assert_eq!(get_attr[1].as_str(), Some("first_address"));
}

#[test]
fn test_empty_template_produces_empty_sections() {
    let dir = tempdir().unwrap();
    let template = dir.path().join("empty.yaml");
    fs::write(
        &template,
        "tosca_definitions_version: tosca_simple_1.0\ninputs:\n  region:\n    type: string\n    default: east\n",
    )
    .unwrap();

    let run = pipeline::translate_template(&template, &PipelineOptions::default()).unwrap();
    let hot = run.hot.unwrap();
    assert!(hot.resources.is_empty());
    assert!(hot.outputs.is_empty());
    assert_eq!(hot.parameters.len(), 1);
    assert_eq!(hot.parameters["region"].param_type, "string");
}

#[test]
fn test_missing_template_is_an_error() {
    let result = pipeline::translate_template(
        &data_file("no_such_template.yaml"),
        &PipelineOptions::default(),
    );
    assert!(result.is_err());
}
