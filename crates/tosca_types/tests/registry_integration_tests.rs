//! Integration tests for the type registry against the built-in
//! TOSCA Simple Profile definitions.

use tosca_types::{EntityKind, TypeRegistry, TypeTag, Value};

#[test]
fn test_builtin_hierarchy_is_complete() {
    let registry = TypeRegistry::builtin().unwrap();

    for name in [
        "tosca.nodes.Root",
        "tosca.nodes.Compute",
        "tosca.nodes.WebServer",
        "tosca.nodes.WebApplication",
        "tosca.nodes.DBMS",
        "tosca.nodes.Database",
        "tosca.nodes.BlockStorage",
        "tosca.nodes.ObjectStorage",
        "tosca.nodes.Network",
        "tosca.capabilities.Container",
        "tosca.capabilities.Endpoint.Database",
        "tosca.relationships.HostedOn",
        "tosca.interfaces.node.Lifecycle",
        "tosca.datatypes.Credential",
    ] {
        assert!(registry.contains(name), "missing builtin type: {name}");
    }
}

#[test]
fn test_database_effective_definitions() {
    let registry = TypeRegistry::builtin().unwrap();

    let props = registry.effective_properties("tosca.nodes.Database").unwrap();
    assert!(props.contains_key("db_name"));
    assert!(props.contains_key("db_user"));
    assert!(props.contains_key("db_password"));

    let caps = registry
        .effective_capabilities("tosca.nodes.Database")
        .unwrap();
    // Own capability plus the inherited `feature` from tosca.nodes.Root.
    assert_eq!(
        caps["database_endpoint"].type_name,
        "tosca.capabilities.Endpoint.Database"
    );
    assert_eq!(caps["feature"].type_name, "tosca.capabilities.Node");

    let requirements = registry
        .effective_requirements("tosca.nodes.Database")
        .unwrap();
    let host = requirements.iter().find(|r| r.name == "host").unwrap();
    assert_eq!(host.capability, "tosca.capabilities.Container");
    assert_eq!(
        host.relationship.as_deref(),
        Some("tosca.relationships.HostedOn")
    );
    let dependency = requirements.iter().find(|r| r.name == "dependency").unwrap();
    assert_eq!(dependency.occurrences, (0, None));
}

#[test]
fn test_webserver_inherits_software_component() {
    let registry = TypeRegistry::builtin().unwrap();
    assert!(registry.is_subtype("tosca.nodes.WebServer", "tosca.nodes.SoftwareComponent"));
    assert!(registry.is_subtype("tosca.nodes.WebServer", "tosca.nodes.Root"));
    assert!(!registry.is_subtype("tosca.nodes.WebServer", "tosca.nodes.Compute"));

    let props = registry
        .effective_properties("tosca.nodes.WebServer")
        .unwrap();
    assert!(props.contains_key("component_version"));
}

#[test]
fn test_extend_with_custom_application_type() {
    let mut registry = TypeRegistry::builtin().unwrap();
    let custom = Value::from_yaml_str(
        r#"
example.nodes.WebApplication.PhotoAlbum:
  derived_from: tosca.nodes.WebApplication
  properties:
    admin_user:
      type: string
"#,
    )
    .unwrap();
    registry.extend(&custom).unwrap();

    let name = "example.nodes.WebApplication.PhotoAlbum";
    assert_eq!(
        registry.get(name).unwrap().kind,
        EntityKind::Node,
    );
    assert!(registry.is_subtype(name, "tosca.nodes.Root"));

    let props = registry.effective_properties(name).unwrap();
    assert_eq!(props["admin_user"].type_tag, TypeTag::String);
    // Inherited requirement from WebApplication survives the extension.
    let requirements = registry.effective_requirements(name).unwrap();
    assert!(requirements.iter().any(|r| r.name == "host"));
}

#[test]
fn test_lifecycle_interface_operations() {
    let registry = TypeRegistry::builtin().unwrap();
    let lifecycle = registry.get("tosca.interfaces.node.Lifecycle").unwrap();
    assert_eq!(lifecycle.kind, EntityKind::Interface);
    assert!(lifecycle.operations.contains(&"configure".to_string()));
}
