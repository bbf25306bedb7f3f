use samael::schema::Assertion;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The authenticated identity taken from a validated assertion. Attribute
/// names are whatever the identity provider asserted; nothing is filtered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub name_id: Option<String>,
    pub attributes: BTreeMap<String, Vec<String>>,
}

impl Principal {
    pub fn from_assertion(assertion: &Assertion) -> Self {
        let name_id = assertion
            .subject
            .as_ref()
            .and_then(|s| s.name_id.as_ref())
            .map(|n| n.value.clone());

        Self {
            name_id,
            attributes: extract_attributes(assertion),
        }
    }
}

// Attributes repeated across statements are merged, keeping document order.
fn extract_attributes(assertion: &Assertion) -> BTreeMap<String, Vec<String>> {
    let mut attrs: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let Some(stmts) = &assertion.attribute_statements else {
        return attrs;
    };
    for stmt in stmts {
        for attr in &stmt.attributes {
            let Some(name) = &attr.name else { continue };
            let values = attr.values.iter().filter_map(|v| v.value.clone());
            attrs.entry(name.clone()).or_default().extend(values);
        }
    }
    attrs
}

#[cfg(test)]
mod tests {
    use super::*;
    use samael::attribute::{Attribute, AttributeValue};
    use samael::schema::{AttributeStatement, Issuer};

    const MAIL: &str = "urn:oid:0.9.2342.19200300.100.1.3";
    const DISPLAY_NAME: &str = "urn:oid:2.16.840.1.113730.3.1.241";

    fn make_assertion(stmts: Option<Vec<AttributeStatement>>) -> Assertion {
        Assertion {
            id: "_test".into(),
            issue_instant: chrono::Utc::now(),
            version: "2.0".into(),
            issuer: Issuer::default(),
            signature: None,
            subject: None,
            conditions: None,
            authn_statements: None,
            attribute_statements: stmts,
        }
    }

    fn make_attr(name: &str, values: &[&str]) -> Attribute {
        Attribute {
            friendly_name: None,
            name: Some(name.into()),
            name_format: None,
            values: values
                .iter()
                .map(|v| AttributeValue {
                    attribute_type: None,
                    value: Some((*v).into()),
                })
                .collect(),
        }
    }

    #[test]
    fn copies_every_attribute() {
        let assertion = make_assertion(Some(vec![AttributeStatement {
            attributes: vec![
                make_attr(MAIL, &["user@example.edu"]),
                make_attr(DISPLAY_NAME, &["Test User"]),
                make_attr("urn:oid:9.9.9.9.9", &["vendor specific"]),
            ],
        }]));

        let principal = Principal::from_assertion(&assertion);
        assert_eq!(principal.attributes.len(), 3);
        assert_eq!(principal.attributes[MAIL], vec!["user@example.edu"]);
        assert_eq!(principal.attributes[DISPLAY_NAME], vec!["Test User"]);
        assert_eq!(
            principal.attributes["urn:oid:9.9.9.9.9"],
            vec!["vendor specific"]
        );
    }

    #[test]
    fn keeps_all_values_in_order() {
        let assertion = make_assertion(Some(vec![
            AttributeStatement {
                attributes: vec![make_attr(MAIL, &["first@example.edu", "second@example.edu"])],
            },
            AttributeStatement {
                attributes: vec![make_attr(MAIL, &["third@example.edu"])],
            },
        ]));

        let principal = Principal::from_assertion(&assertion);
        assert_eq!(
            principal.attributes[MAIL],
            vec!["first@example.edu", "second@example.edu", "third@example.edu"]
        );
    }

    #[test]
    fn empty_attribute_statements() {
        let principal = Principal::from_assertion(&make_assertion(None));
        assert!(principal.attributes.is_empty());
        assert_eq!(principal.name_id, None);
    }

    #[test]
    fn skips_unnamed_attributes_and_empty_values() {
        let assertion = make_assertion(Some(vec![AttributeStatement {
            attributes: vec![
                Attribute {
                    friendly_name: Some("mail".into()),
                    name: None,
                    name_format: None,
                    values: vec![],
                },
                Attribute {
                    friendly_name: None,
                    name: Some(MAIL.into()),
                    name_format: None,
                    values: vec![AttributeValue {
                        attribute_type: None,
                        value: None,
                    }],
                },
            ],
        }]));

        let principal = Principal::from_assertion(&assertion);
        assert_eq!(principal.attributes.len(), 1);
        assert!(principal.attributes[MAIL].is_empty());
    }
}
