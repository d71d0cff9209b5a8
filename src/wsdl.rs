//! WSDL 1.1 operation extraction.
//!
//! Reads the operations a WSDL binds and synthesizes one default SOAP response
//! per operation from the output message and the embedded schema. A document
//! that cannot be read yields no operations; the owning service still loads.

use crate::error::WsdlError;
use crate::sample::{render_envelope, SampleNode, SchemaSet};
use crate::xml::Element;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Prefix for the namespace request payloads of an operation are qualified with.
pub const TARGET_NAMESPACE_PREFIX: &str = "tns";
/// Prefix for the `<definitions>` target namespace when it differs from the
/// payload namespace.
pub const DEFINITIONS_NAMESPACE_PREFIX: &str = "wsdl";

/// An operation discovered in a WSDL document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WsdlOperation {
    pub name: String,
    /// Namespaces a request for this operation may be qualified with, by prefix.
    pub namespaces: BTreeMap<String, String>,
    /// Complete SOAP envelope used as the operation's default response.
    pub default_response: String,
}

/// Extract every bound operation from `wsdl`.
///
/// Malformed documents and documents without bindings are logged and give an
/// empty list.
pub fn read_operations(wsdl: &str) -> Vec<WsdlOperation> {
    match try_read_operations(wsdl) {
        Ok(operations) => {
            debug!(operations = operations.len(), "Read WSDL operations");
            operations
        }
        Err(e) => {
            warn!(error = %e, "WSDL yields no operations");
            Vec::new()
        }
    }
}

pub fn try_read_operations(wsdl: &str) -> Result<Vec<WsdlOperation>, WsdlError> {
    let root = Element::parse(wsdl)?;
    if root.local_name != "definitions" {
        return Err(WsdlError::NotWsdl(root.qualified_name()));
    }
    let document = WsdlDocument::new(&root);
    if document.bindings().next().is_none() {
        return Err(WsdlError::NoBindings);
    }

    let mut operations: Vec<WsdlOperation> = Vec::new();
    for binding in document.bindings() {
        let port_type = binding
            .attr("type")
            .and_then(|name| document.named("portType", &local(name)));
        let binding_style = binding
            .child("binding")
            .and_then(|soap| soap.attr("style"))
            .unwrap_or("document");

        for operation in binding.children_named("operation") {
            let Some(name) = operation.attr("name") else {
                continue;
            };
            if operations.iter().any(|known| known.name == name) {
                continue;
            }
            let style = operation
                .child("operation")
                .and_then(|soap| soap.attr("style"))
                .unwrap_or(binding_style);
            let abstract_operation = port_type
                .and_then(|pt| pt.children_named("operation").find(|op| op.attr("name") == Some(name)));
            let message = |direction: &str| {
                abstract_operation
                    .and_then(|op| op.child(direction))
                    .and_then(|io| io.attr("message"))
                    .and_then(|message| document.named("message", &local(message)))
            };

            let payload_namespace = if style == "rpc" {
                operation
                    .child("input")
                    .and_then(|input| input.child("body"))
                    .and_then(|body| body.attr("namespace"))
                    .map(str::to_string)
            } else {
                message("input").and_then(|input| document.element_namespace(input))
            };
            let body = document.response_body(name, message("output"), style);
            operations.push(WsdlOperation {
                name: name.to_string(),
                namespaces: document.request_namespaces(payload_namespace),
                default_response: default_envelope(name, &body),
            });
        }
    }
    Ok(operations)
}

fn default_envelope(operation: &str, body: &SampleNode) -> String {
    match render_envelope(body) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(
                operation = %operation,
                error = %e,
                "Could not render the sample response, using an empty wrapper"
            );
            let wrapper = SampleNode::new(body.name.as_str(), body.namespace.clone());
            render_envelope(&wrapper).unwrap_or_default()
        }
    }
}

struct WsdlDocument<'a> {
    root: &'a Element,
    schemas: SchemaSet<'a>,
}

impl<'a> WsdlDocument<'a> {
    fn new(root: &'a Element) -> Self {
        let schemas = root
            .children
            .iter()
            .filter(|c| c.local_name == "types")
            .flat_map(|types| types.children.iter().filter(|c| c.local_name == "schema"))
            .collect();
        Self {
            root,
            schemas: SchemaSet::new(schemas),
        }
    }

    fn target_namespace(&self) -> Option<&'a str> {
        self.root.attr("targetNamespace")
    }

    fn bindings(&self) -> impl Iterator<Item = &'a Element> {
        self.root.children.iter().filter(|c| c.local_name == "binding")
    }

    /// `tns` maps to the namespace request payloads are qualified with, the
    /// definitions namespace unless the binding or schema says otherwise. A
    /// definitions namespace that differs is kept under `wsdl`.
    fn request_namespaces(&self, payload: Option<String>) -> BTreeMap<String, String> {
        let definitions = self.target_namespace().map(str::to_string);
        let mut namespaces = BTreeMap::new();
        match payload {
            Some(payload) => {
                if let Some(definitions) = definitions.filter(|uri| *uri != payload) {
                    namespaces.insert(DEFINITIONS_NAMESPACE_PREFIX.to_string(), definitions);
                }
                namespaces.insert(TARGET_NAMESPACE_PREFIX.to_string(), payload);
            }
            None => {
                if let Some(definitions) = definitions {
                    namespaces.insert(TARGET_NAMESPACE_PREFIX.to_string(), definitions);
                }
            }
        }
        namespaces
    }

    /// Namespace of the first element part of `message`: the part's QName
    /// namespace, else the target namespace of the schema declaring it.
    fn element_namespace(&self, message: &Element) -> Option<String> {
        let (part, element) = message
            .children_named("part")
            .find_map(|part| part.attr("element").map(|element| (part, element)))?;
        let qname = part.resolve_qname(element);
        qname.namespace.or_else(|| {
            self.schemas
                .global_element(&qname.local, None)
                .and_then(|node| node.namespace)
        })
    }

    fn named(&self, kind: &str, name: &str) -> Option<&'a Element> {
        self.root
            .children
            .iter()
            .find(|c| c.local_name == kind && c.attr("name") == Some(name))
    }

    fn response_body(&self, operation: &str, output: Option<&'a Element>, style: &str) -> SampleNode {
        let rpc_wrapper = || {
            SampleNode::new(
                format!("{}Response", operation),
                self.target_namespace().map(str::to_string),
            )
        };
        let Some(message) = output else {
            return rpc_wrapper();
        };
        let parts: Vec<&Element> = message.children_named("part").collect();

        if style != "rpc" {
            if let Some(element) = parts.iter().find_map(|part| part.attr("element").map(|e| (part, e))) {
                let (part, element) = element;
                let qname = part.resolve_qname(element);
                return self
                    .schemas
                    .global_element(&qname.local, qname.namespace.as_deref())
                    .unwrap_or_else(|| SampleNode::new(qname.local, qname.namespace));
            }
        }

        let mut wrapper = rpc_wrapper();
        for part in parts {
            let name = part.attr("name").unwrap_or("part");
            let node = match part.attr("element") {
                Some(element) => {
                    let qname = part.resolve_qname(element);
                    self.schemas
                        .global_element(&qname.local, qname.namespace.as_deref())
                        .unwrap_or_else(|| SampleNode::new(qname.local, qname.namespace))
                }
                None => self.schemas.typed_node(name, part),
            };
            wrapper.children.push(node);
        }
        wrapper
    }
}

fn local(qualified: &str) -> String {
    crate::xml::split_qname(qualified.trim()).1.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELLO: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<definitions name="HelloService"
   targetNamespace="http://www.examples.com/wsdl/HelloService.wsdl"
   xmlns="http://schemas.xmlsoap.org/wsdl/"
   xmlns:soap="http://schemas.xmlsoap.org/wsdl/soap/"
   xmlns:tns="http://www.examples.com/wsdl/HelloService.wsdl"
   xmlns:xsd="http://www.w3.org/2001/XMLSchema">
   <message name="SayHelloRequest"><part name="firstName" type="xsd:string"/></message>
   <message name="SayHelloResponse"><part name="greeting" type="xsd:string"/></message>
   <portType name="Hello_PortType">
      <operation name="sayHello">
         <input message="tns:SayHelloRequest"/>
         <output message="tns:SayHelloResponse"/>
      </operation>
   </portType>
   <binding name="Hello_Binding" type="tns:Hello_PortType">
      <soap:binding style="rpc" transport="http://schemas.xmlsoap.org/soap/http"/>
      <operation name="sayHello">
         <soap:operation soapAction="sayHello"/>
         <input><soap:body use="literal"/></input>
         <output><soap:body use="literal"/></output>
      </operation>
   </binding>
</definitions>"#;

    const DOCUMENT: &str = r#"<wsdl:definitions targetNamespace="urn:books"
   xmlns:wsdl="http://schemas.xmlsoap.org/wsdl/"
   xmlns:soap="http://schemas.xmlsoap.org/wsdl/soap/"
   xmlns:tns="urn:books"
   xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <wsdl:types>
    <xs:schema targetNamespace="urn:books" elementFormDefault="qualified">
      <xs:element name="ReservationResponse">
        <xs:complexType>
          <xs:sequence>
            <xs:element name="Status" type="xs:string" default="DefStatus"/>
            <xs:element name="Confirmed" type="xs:boolean"/>
          </xs:sequence>
        </xs:complexType>
      </xs:element>
    </xs:schema>
  </wsdl:types>
  <wsdl:message name="ReservationOut"><wsdl:part name="body" element="tns:ReservationResponse"/></wsdl:message>
  <wsdl:message name="CancelOut"><wsdl:part name="body" element="tns:CancelResponse"/></wsdl:message>
  <wsdl:portType name="Books">
    <wsdl:operation name="Reservation"><wsdl:output message="tns:ReservationOut"/></wsdl:operation>
    <wsdl:operation name="Cancel"><wsdl:output message="tns:CancelOut"/></wsdl:operation>
  </wsdl:portType>
  <wsdl:binding name="BooksSoap" type="tns:Books">
    <soap:binding style="document" transport="http://schemas.xmlsoap.org/soap/http"/>
    <wsdl:operation name="Reservation"/>
    <wsdl:operation name="Cancel"/>
  </wsdl:binding>
</wsdl:definitions>"#;

    const SPLIT_NAMESPACES: &str = r#"<wsdl:definitions targetNamespace="urn:books-wsdl"
   xmlns:wsdl="http://schemas.xmlsoap.org/wsdl/"
   xmlns:soap="http://schemas.xmlsoap.org/wsdl/soap/"
   xmlns:tns="urn:books-wsdl"
   xmlns:types="urn:books-types"
   xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <wsdl:types>
    <xs:schema targetNamespace="urn:books-types" elementFormDefault="qualified">
      <xs:element name="Reservation" type="xs:string"/>
      <xs:element name="ReservationResponse" type="xs:string"/>
    </xs:schema>
  </wsdl:types>
  <wsdl:message name="ReservationIn"><wsdl:part name="body" element="types:Reservation"/></wsdl:message>
  <wsdl:message name="ReservationOut"><wsdl:part name="body" element="types:ReservationResponse"/></wsdl:message>
  <wsdl:message name="LookupIn"><wsdl:part name="isbn" type="xs:string"/></wsdl:message>
  <wsdl:portType name="Books">
    <wsdl:operation name="Reservation">
      <wsdl:input message="tns:ReservationIn"/>
      <wsdl:output message="tns:ReservationOut"/>
    </wsdl:operation>
    <wsdl:operation name="Lookup"><wsdl:input message="tns:LookupIn"/></wsdl:operation>
  </wsdl:portType>
  <wsdl:binding name="BooksSoap" type="tns:Books">
    <soap:binding style="document" transport="http://schemas.xmlsoap.org/soap/http"/>
    <wsdl:operation name="Reservation"/>
    <wsdl:operation name="Lookup">
      <soap:operation style="rpc"/>
      <wsdl:input><soap:body use="literal" namespace="urn:books-rpc"/></wsdl:input>
    </wsdl:operation>
  </wsdl:binding>
</wsdl:definitions>"#;

    fn body_of(operation: &WsdlOperation) -> Element {
        let envelope = Element::parse(&operation.default_response).unwrap();
        envelope.child("Body").unwrap().children[0].clone()
    }

    #[test]
    fn test_rpc_operation() {
        let operations = read_operations(HELLO);
        assert_eq!(operations.len(), 1);
        assert_eq!(operations[0].name, "sayHello");
        assert_eq!(
            operations[0].namespaces.get(TARGET_NAMESPACE_PREFIX).map(String::as_str),
            Some("http://www.examples.com/wsdl/HelloService.wsdl")
        );
        assert_eq!(operations[0].namespaces.len(), 1);

        let body = body_of(&operations[0]);
        assert_eq!(body.local_name, "sayHelloResponse");
        assert_eq!(body.child("greeting").unwrap().text, "?");
    }

    #[test]
    fn test_document_operations() {
        let operations = read_operations(DOCUMENT);
        let names: Vec<&str> = operations.iter().map(|op| op.name.as_str()).collect();
        assert_eq!(names, vec!["Reservation", "Cancel"]);

        let body = body_of(&operations[0]);
        assert_eq!(body.local_name, "ReservationResponse");
        assert_eq!(body.namespace.as_deref(), Some("urn:books"));
        assert_eq!(body.child("Status").unwrap().text, "DefStatus");
        assert_eq!(body.child("Confirmed").unwrap().text, "false");
    }

    #[test]
    fn test_document_operation_uses_schema_namespace() {
        let operations = read_operations(SPLIT_NAMESPACES);
        let reservation = &operations[0];
        assert_eq!(
            reservation.namespaces.get(TARGET_NAMESPACE_PREFIX).map(String::as_str),
            Some("urn:books-types")
        );
        assert_eq!(
            reservation.namespaces.get(DEFINITIONS_NAMESPACE_PREFIX).map(String::as_str),
            Some("urn:books-wsdl")
        );
        assert_eq!(body_of(reservation).namespace.as_deref(), Some("urn:books-types"));
    }

    #[test]
    fn test_rpc_operation_uses_soap_body_namespace() {
        let operations = read_operations(SPLIT_NAMESPACES);
        let lookup = &operations[1];
        assert_eq!(lookup.name, "Lookup");
        assert_eq!(
            lookup.namespaces.get(TARGET_NAMESPACE_PREFIX).map(String::as_str),
            Some("urn:books-rpc")
        );
        assert_eq!(
            lookup.namespaces.get(DEFINITIONS_NAMESPACE_PREFIX).map(String::as_str),
            Some("urn:books-wsdl")
        );
    }

    #[test]
    fn test_default_envelope_wraps_body() {
        let mut body = SampleNode::new("LookupResponse", Some("urn:books-rpc".to_string()));
        body.children.push(SampleNode::new("title", None));
        let envelope = Element::parse(&default_envelope("Lookup", &body)).unwrap();
        let response = envelope.find_path("Body/LookupResponse").unwrap();
        assert_eq!(response.namespace.as_deref(), Some("urn:books-rpc"));
        assert!(response.child("title").is_some());
    }

    #[test]
    fn test_unresolvable_element_gives_wrapper_alone() {
        let operations = read_operations(DOCUMENT);
        let body = body_of(&operations[1]);
        assert_eq!(body.local_name, "CancelResponse");
        assert!(body.children.is_empty());
    }

    #[test]
    fn test_unreadable_documents_give_no_operations() {
        assert!(read_operations("this is not a wsdl").is_empty());
        assert!(read_operations("<definitions><binding").is_empty());
        assert!(read_operations(r#"<definitions xmlns="http://schemas.xmlsoap.org/wsdl/"><message name="m"/></definitions>"#).is_empty());
        assert!(matches!(
            try_read_operations("<definitions/>"),
            Err(WsdlError::NoBindings)
        ));
        assert!(matches!(
            try_read_operations("<html/>"),
            Err(WsdlError::NotWsdl(_))
        ));
    }
}
