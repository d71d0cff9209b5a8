//! Sample instance synthesis from an embedded XML schema.
//!
//! Produces one representative instance per element: leaves get a fixed,
//! default, enumerated or type-based placeholder value, complex content is
//! expanded a bounded number of levels, and anything that cannot be resolved
//! becomes an empty element.

use crate::xml::{Element, QName};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::collections::BTreeMap;

pub const SOAP_ENVELOPE_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
pub const XML_SCHEMA_NS: &str = "http://www.w3.org/2001/XMLSchema";

/// Complex content below the wrapper is expanded this many levels deep.
const NESTED_LEVELS: usize = 1;

/// One element of the generated instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleNode {
    pub name: String,
    /// `None` for unqualified local elements.
    pub namespace: Option<String>,
    pub value: Option<String>,
    pub children: Vec<SampleNode>,
}

impl SampleNode {
    pub fn new(name: impl Into<String>, namespace: Option<String>) -> Self {
        Self {
            name: name.into(),
            namespace,
            value: None,
            children: Vec::new(),
        }
    }

    fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

/// The `<schema>` sections embedded in a WSDL `<types>` block.
pub struct SchemaSet<'a> {
    schemas: Vec<&'a Element>,
}

impl<'a> SchemaSet<'a> {
    pub fn new(schemas: Vec<&'a Element>) -> Self {
        Self { schemas }
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Find a global declaration. A schema whose `targetNamespace` matches
    /// `namespace` is searched first, then every schema by local name.
    fn global(
        &self,
        kind: &str,
        name: &str,
        namespace: Option<&str>,
    ) -> Option<(&'a Element, &'a Element)> {
        namespace
            .and_then(|uri| {
                self.schemas
                    .iter()
                    .filter(|schema| schema.attr("targetNamespace") == Some(uri))
                    .find_map(|&schema| declared_in(schema, kind, name))
            })
            .or_else(|| {
                self.schemas
                    .iter()
                    .find_map(|&schema| declared_in(schema, kind, name))
            })
    }

    /// Build the instance for the global element `name`, or `None` when the
    /// schema does not declare it.
    pub fn global_element(&self, name: &str, namespace: Option<&str>) -> Option<SampleNode> {
        let (decl, schema) = self.global("element", name, namespace)?;
        let mut builder = InstanceBuilder {
            schemas: self,
            expanding: Vec::new(),
        };
        Some(builder.element(decl, schema, true, 0))
    }

    /// Build a leaf or complex instance for a message part declared by type.
    pub fn typed_node(&self, name: &str, part: &Element) -> SampleNode {
        let mut builder = InstanceBuilder {
            schemas: self,
            expanding: Vec::new(),
        };
        let mut node = SampleNode::new(name, None);
        match part.attr("type") {
            Some(type_name) => builder.fill_from_type(&mut node, &part.resolve_qname(type_name), 1),
            None => node.value = Some(placeholder("anyType").to_string()),
        }
        node
    }
}

fn declared_in<'a>(
    schema: &'a Element,
    kind: &str,
    name: &str,
) -> Option<(&'a Element, &'a Element)> {
    schema
        .children
        .iter()
        .find(|decl| decl.local_name == kind && decl.attr("name") == Some(name))
        .map(|decl| (decl, schema))
}

struct InstanceBuilder<'s, 'a> {
    schemas: &'s SchemaSet<'a>,
    // Types and elements currently being expanded, to break recursive schemas.
    expanding: Vec<String>,
}

impl<'s, 'a> InstanceBuilder<'s, 'a> {
    fn element(
        &mut self,
        decl: &'a Element,
        schema: &'a Element,
        global: bool,
        depth: usize,
    ) -> SampleNode {
        if let Some(reference) = decl.attr("ref") {
            let target = decl.resolve_qname(reference);
            let key = format!("element:{}", target.local);
            let found = self
                .schemas
                .global("element", &target.local, target.namespace.as_deref());
            return match found {
                Some((target_decl, target_schema)) if !self.expanding.contains(&key) => {
                    self.expanding.push(key);
                    let node = self.element(target_decl, target_schema, true, depth);
                    self.expanding.pop();
                    node
                }
                _ => SampleNode::new(target.local, target.namespace),
            };
        }

        let name = decl.attr("name").unwrap_or("element");
        let namespace = if global || schema.attr("elementFormDefault") == Some("qualified") {
            schema.attr("targetNamespace").map(str::to_string)
        } else {
            None
        };
        let mut node = SampleNode::new(name, namespace);

        if let Some(value) = decl.attr("fixed").or_else(|| decl.attr("default")) {
            return node.with_value(value);
        }
        if let Some(complex) = decl.child("complexType") {
            if depth <= NESTED_LEVELS {
                node.children = self.complex_children(complex, schema, depth);
            }
            return node;
        }
        if let Some(simple) = decl.child("simpleType") {
            node.value = Some(self.simple_value(simple));
            return node;
        }
        match decl.attr("type") {
            Some(type_name) => {
                let qname = decl.resolve_qname(type_name);
                self.fill_from_type(&mut node, &qname, depth);
            }
            None => node.value = Some(placeholder("anyType").to_string()),
        }
        node
    }

    fn fill_from_type(&mut self, node: &mut SampleNode, qname: &QName, depth: usize) {
        if qname.namespace.as_deref() == Some(XML_SCHEMA_NS) {
            node.value = Some(placeholder(&qname.local).to_string());
            return;
        }
        let namespace = qname.namespace.as_deref();
        let complex = self.schemas.global("complexType", &qname.local, namespace);
        if let Some((complex, complex_schema)) = complex {
            let key = format!("type:{}", qname.local);
            if depth <= NESTED_LEVELS && !self.expanding.contains(&key) {
                self.expanding.push(key);
                node.children = self.complex_children(complex, complex_schema, depth);
                self.expanding.pop();
            }
            return;
        }
        if let Some((simple, _)) = self.schemas.global("simpleType", &qname.local, namespace) {
            node.value = Some(self.simple_value(simple));
            return;
        }
        if is_builtin(&qname.local) {
            node.value = Some(placeholder(&qname.local).to_string());
        }
        // Anything else is unresolvable: leave the element empty.
    }

    fn complex_children(
        &mut self,
        complex: &'a Element,
        schema: &'a Element,
        depth: usize,
    ) -> Vec<SampleNode> {
        let mut children = Vec::new();
        for content in &complex.children {
            match content.local_name.as_str() {
                "sequence" | "all" | "choice" | "group" => {
                    self.particles(content, schema, depth, &mut children)
                }
                "complexContent" => {
                    for derivation in &content.children {
                        if let Some(base) = derivation.attr("base") {
                            let base = derivation.resolve_qname(base);
                            let key = format!("type:{}", base.local);
                            let found = self.schemas.global(
                                "complexType",
                                &base.local,
                                base.namespace.as_deref(),
                            );
                            if let Some((base_type, base_schema)) = found {
                                if !self.expanding.contains(&key) {
                                    self.expanding.push(key);
                                    children.extend(self.complex_children(base_type, base_schema, depth));
                                    self.expanding.pop();
                                }
                            }
                        }
                        children.extend(self.complex_children(derivation, schema, depth));
                    }
                }
                _ => {}
            }
        }
        children
    }

    fn particles(
        &mut self,
        group: &'a Element,
        schema: &'a Element,
        depth: usize,
        out: &mut Vec<SampleNode>,
    ) {
        match group.local_name.as_str() {
            "element" => out.push(self.element(group, schema, false, depth + 1)),
            "sequence" | "all" => {
                for particle in &group.children {
                    self.particles(particle, schema, depth, out);
                }
            }
            // One representative instance: the first alternative.
            "choice" => {
                if let Some(first) = group
                    .children
                    .iter()
                    .find(|c| matches!(c.local_name.as_str(), "element" | "sequence" | "choice" | "group"))
                {
                    self.particles(first, schema, depth, out);
                }
            }
            "group" => {
                let Some(reference) = group.attr("ref") else {
                    for particle in &group.children {
                        self.particles(particle, schema, depth, out);
                    }
                    return;
                };
                let target = group.resolve_qname(reference);
                let key = format!("group:{}", target.local);
                let found = self
                    .schemas
                    .global("group", &target.local, target.namespace.as_deref());
                if let Some((definition, group_schema)) = found {
                    if !self.expanding.contains(&key) {
                        self.expanding.push(key);
                        for particle in &definition.children {
                            self.particles(particle, group_schema, depth, out);
                        }
                        self.expanding.pop();
                    }
                }
            }
            _ => {}
        }
    }

    fn simple_value(&mut self, simple: &'a Element) -> String {
        let Some(restriction) = simple.child("restriction") else {
            return placeholder("anySimpleType").to_string();
        };
        if let Some(value) = restriction
            .children_named("enumeration")
            .find_map(|e| e.attr("value"))
        {
            return value.to_string();
        }
        let Some(base) = restriction.attr("base") else {
            return placeholder("anySimpleType").to_string();
        };
        let base = restriction.resolve_qname(base);
        if base.namespace.as_deref() != Some(XML_SCHEMA_NS) {
            let key = format!("type:{}", base.local);
            let found = self
                .schemas
                .global("simpleType", &base.local, base.namespace.as_deref());
            if let Some((base_type, _)) = found {
                if !self.expanding.contains(&key) {
                    self.expanding.push(key);
                    let value = self.simple_value(base_type);
                    self.expanding.pop();
                    return value;
                }
            }
        }
        placeholder(&base.local).to_string()
    }
}

fn is_builtin(local: &str) -> bool {
    matches!(
        local,
        "string"
            | "normalizedString"
            | "token"
            | "anyURI"
            | "QName"
            | "Name"
            | "NCName"
            | "language"
            | "int"
            | "integer"
            | "long"
            | "short"
            | "byte"
            | "nonNegativeInteger"
            | "positiveInteger"
            | "nonPositiveInteger"
            | "negativeInteger"
            | "unsignedInt"
            | "unsignedLong"
            | "unsignedShort"
            | "unsignedByte"
            | "decimal"
            | "float"
            | "double"
            | "boolean"
            | "date"
            | "dateTime"
            | "time"
            | "base64Binary"
            | "hexBinary"
            | "anyType"
            | "anySimpleType"
    )
}

/// Example value for an XSD built-in type.
pub fn placeholder(builtin: &str) -> &'static str {
    match builtin {
        "int" | "integer" | "long" | "short" | "byte" | "nonNegativeInteger" | "unsignedInt"
        | "unsignedLong" | "unsignedShort" | "unsignedByte" | "nonPositiveInteger" => "0",
        "positiveInteger" => "1",
        "negativeInteger" => "-1",
        "decimal" | "float" | "double" => "0.0",
        "boolean" => "false",
        "date" => "2000-01-01",
        "dateTime" => "2000-01-01T00:00:00",
        "time" => "00:00:00",
        _ => "?",
    }
}

/// Serialize `body` inside a SOAP 1.1 envelope.
pub fn render_envelope(body: &SampleNode) -> Result<String, quick_xml::Error> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Start(
        BytesStart::new("soapenv:Envelope").with_attributes([("xmlns:soapenv", SOAP_ENVELOPE_NS)]),
    ))?;
    writer.write_event(Event::Empty(BytesStart::new("soapenv:Header")))?;
    writer.write_event(Event::Start(BytesStart::new("soapenv:Body")))?;
    write_node(&mut writer, body, &BTreeMap::new())?;
    writer.write_event(Event::End(BytesEnd::new("soapenv:Body")))?;
    writer.write_event(Event::End(BytesEnd::new("soapenv:Envelope")))?;
    Ok(String::from_utf8_lossy(&writer.into_inner()).into_owned())
}

fn write_node(
    writer: &mut Writer<Vec<u8>>,
    node: &SampleNode,
    in_scope: &BTreeMap<String, String>,
) -> Result<(), quick_xml::Error> {
    let mut scope = in_scope.clone();
    let mut declaration = None;
    let tag = match &node.namespace {
        Some(uri) => {
            let prefix = match scope.get(uri) {
                Some(prefix) => prefix.clone(),
                None => {
                    let prefix = if scope.is_empty() {
                        "ns".to_string()
                    } else {
                        format!("ns{}", scope.len())
                    };
                    scope.insert(uri.clone(), prefix.clone());
                    declaration = Some((format!("xmlns:{}", prefix), uri.clone()));
                    prefix
                }
            };
            format!("{}:{}", prefix, node.name)
        }
        None => node.name.clone(),
    };

    let mut start = BytesStart::new(tag.as_str());
    if let Some((key, uri)) = &declaration {
        start.push_attribute((key.as_str(), uri.as_str()));
    }

    if node.children.is_empty() && node.value.is_none() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }

    writer.write_event(Event::Start(start))?;
    if let Some(value) = &node.value {
        writer.write_event(Event::Text(BytesText::new(value)))?;
    }
    for child in &node.children {
        write_node(writer, child, &scope)?;
    }
    writer.write_event(Event::End(BytesEnd::new(tag.as_str())))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: &str = r#"<types xmlns:xsd="http://www.w3.org/2001/XMLSchema">
  <xsd:schema targetNamespace="urn:books" xmlns:tns="urn:books" elementFormDefault="qualified">
    <xsd:element name="ReservationResponse">
      <xsd:complexType>
        <xsd:sequence>
          <xsd:element name="Status" type="xsd:string" default="DefStatus"/>
          <xsd:element name="Count" type="xsd:int"/>
          <xsd:element name="Kind" type="tns:Kind"/>
          <xsd:element name="Details" type="tns:Details"/>
          <xsd:element ref="tns:Note"/>
        </xsd:sequence>
      </xsd:complexType>
    </xsd:element>
    <xsd:element name="Note" type="xsd:string"/>
    <xsd:element name="Broken" type="tns:DoesNotExist"/>
    <xsd:simpleType name="Kind">
      <xsd:restriction base="xsd:string">
        <xsd:enumeration value="HARDCOVER"/>
        <xsd:enumeration value="PAPERBACK"/>
      </xsd:restriction>
    </xsd:simpleType>
    <xsd:complexType name="Details">
      <xsd:sequence>
        <xsd:element name="Price" type="xsd:double"/>
        <xsd:element name="Deeper" type="tns:Details"/>
      </xsd:sequence>
    </xsd:complexType>
  </xsd:schema>
</types>"#;

    fn schemas(types: &Element) -> SchemaSet<'_> {
        SchemaSet::new(types.children_named("schema").collect())
    }

    fn child<'n>(node: &'n SampleNode, name: &str) -> &'n SampleNode {
        node.children
            .iter()
            .find(|c| c.name == name)
            .unwrap_or_else(|| panic!("missing child {}", name))
    }

    #[test]
    fn test_global_element_instance() {
        let types = Element::parse(SCHEMA).unwrap();
        let set = schemas(&types);
        let node = set.global_element("ReservationResponse", Some("urn:books")).unwrap();

        assert_eq!(node.namespace.as_deref(), Some("urn:books"));
        assert_eq!(child(&node, "Status").value.as_deref(), Some("DefStatus"));
        assert_eq!(child(&node, "Count").value.as_deref(), Some("0"));
        assert_eq!(child(&node, "Kind").value.as_deref(), Some("HARDCOVER"));
        assert_eq!(child(&node, "Note").value.as_deref(), Some("?"));
    }

    #[test]
    fn test_nested_expansion_is_bounded() {
        let types = Element::parse(SCHEMA).unwrap();
        let set = schemas(&types);
        let node = set.global_element("ReservationResponse", Some("urn:books")).unwrap();

        let details = child(&node, "Details");
        assert_eq!(child(details, "Price").value.as_deref(), Some("0.0"));
        let deeper = child(details, "Deeper");
        assert!(deeper.children.is_empty());
    }

    #[test]
    fn test_unresolvable_type_yields_empty_element() {
        let types = Element::parse(SCHEMA).unwrap();
        let set = schemas(&types);
        let node = set.global_element("Broken", None).unwrap();
        assert!(node.children.is_empty());
        assert_eq!(node.value, None);
        assert!(set.global_element("Missing", Some("urn:books")).is_none());
    }

    #[test]
    fn test_same_name_in_two_schemas_resolves_by_namespace() {
        let types = Element::parse(
            r#"<types xmlns:xsd="http://www.w3.org/2001/XMLSchema">
  <xsd:schema targetNamespace="urn:common">
    <xsd:element name="Status" type="xsd:int"/>
    <xsd:simpleType name="Code">
      <xsd:restriction base="xsd:string"><xsd:enumeration value="COMMON"/></xsd:restriction>
    </xsd:simpleType>
  </xsd:schema>
  <xsd:schema targetNamespace="urn:orders" xmlns:o="urn:orders">
    <xsd:element name="Status" type="o:Code"/>
    <xsd:simpleType name="Code">
      <xsd:restriction base="xsd:string"><xsd:enumeration value="SHIPPED"/></xsd:restriction>
    </xsd:simpleType>
  </xsd:schema>
</types>"#,
        )
        .unwrap();
        let set = schemas(&types);

        let orders = set.global_element("Status", Some("urn:orders")).unwrap();
        assert_eq!(orders.namespace.as_deref(), Some("urn:orders"));
        assert_eq!(orders.value.as_deref(), Some("SHIPPED"));

        let common = set.global_element("Status", Some("urn:common")).unwrap();
        assert_eq!(common.namespace.as_deref(), Some("urn:common"));
        assert_eq!(common.value.as_deref(), Some("0"));

        // No namespace, or one no schema targets: first declaration by name.
        let unqualified = set.global_element("Status", None).unwrap();
        assert_eq!(unqualified.namespace.as_deref(), Some("urn:common"));
        assert!(set.global_element("Status", Some("urn:other")).is_some());
    }

    #[test]
    fn test_render_envelope() {
        let mut body = SampleNode::new("sayHelloResponse", Some("urn:hello".to_string()));
        body.children.push(SampleNode::new("greeting", None).with_value("?"));
        let xml = render_envelope(&body).unwrap();

        let root = Element::parse(&xml).unwrap();
        assert_eq!(root.local_name, "Envelope");
        assert_eq!(root.namespace.as_deref(), Some(SOAP_ENVELOPE_NS));
        let response = root.find_path("Body/sayHelloResponse").unwrap();
        assert_eq!(response.namespace.as_deref(), Some("urn:hello"));
        assert_eq!(response.child("greeting").unwrap().text, "?");
        assert_eq!(response.child("greeting").unwrap().namespace, None);
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(placeholder("string"), "?");
        assert_eq!(placeholder("long"), "0");
        assert_eq!(placeholder("double"), "0.0");
        assert_eq!(placeholder("boolean"), "false");
        assert_eq!(placeholder("dateTime"), "2000-01-01T00:00:00");
    }
}
