use serde_json::json;

use form_spec::{
    Field, FieldType, FormSpec, ImportError, ImportedDocument, export_field, export_form,
    import_document, interchange::import_value,
};

fn order_form_json() -> &'static str {
    include_str!("../tests/fixtures/order_form.json")
}

fn import_form(json: &str) -> FormSpec {
    match import_document(json).expect("import") {
        ImportedDocument::Form(spec) => spec,
        other => panic!("expected a form, got {:?}", other),
    }
}

#[test]
fn form_export_round_trips() {
    let spec = import_form(order_form_json());
    assert_eq!(spec.id, "order-form");
    assert_eq!(spec.pages.len(), 2);
    assert_eq!(spec.fields().count(), 12);

    let exported = export_form(&spec).expect("export");
    let again = import_form(&exported);
    assert_eq!(again, spec);

    let value: serde_json::Value = serde_json::from_str(&exported).expect("json");
    assert_eq!(value["submitButtonText"], json!("Place Order"));
    let total = &value["pages"][1]["fields"][2];
    assert_eq!(total["type"], json!("calculation"));
    assert_eq!(total["formula"], json!("{field:qty} * {field:price}"));
    assert_eq!(value["pages"][0]["fields"][0]["width"], json!("1/2"));
}

#[test]
fn field_snippets_are_recognised() {
    let snippet = json!({
        "id": "phone",
        "type": "text",
        "label": "Phone",
        "placeholder": "+1 555 0100"
    });
    let document = import_value(snippet).expect("import");
    let ImportedDocument::Field(field) = document else {
        panic!("expected a field");
    };
    assert_eq!(field.id, "phone");
    assert_eq!(field.kind, FieldType::Text);
    assert_eq!(field.placeholder.as_deref(), Some("+1 555 0100"));

    let exported = export_field(&field).expect("export");
    assert_eq!(
        import_document(&exported).expect("reimport"),
        ImportedDocument::Field(field)
    );
}

#[test]
fn unrecognised_documents_are_rejected() {
    let cases = [
        json!({ "title": "no pages" }),
        json!({ "id": "x", "type": "text" }),
        json!({ "id": "", "type": "text", "label": "Blank" }),
        json!({ "pages": "not-an-array" }),
        json!([1, 2, 3]),
    ];
    for case in cases {
        let err = import_value(case.clone()).unwrap_err();
        assert!(
            matches!(err, ImportError::StructuralMismatch),
            "{} gave {:?}",
            case,
            err
        );
    }
}

#[test]
fn invalid_json_is_reported() {
    let err = import_document("{ not json").unwrap_err();
    assert!(matches!(err, ImportError::InvalidJson(_)));
}

#[test]
fn malformed_forms_are_rejected() {
    let err = import_document(r#"{ "id": "f", "pages": [ { "fields": [ { "id": 3 } ] } ] }"#)
        .unwrap_err();
    assert!(matches!(err, ImportError::Malformed { kind: "form", .. }));

    let err = import_document(r#"{ "id": "f", "pages": [ { "id": "p", "fields": [ { "id": " ", "type": "text" } ] } ] }"#)
        .unwrap_err();
    assert!(matches!(err, ImportError::EmptyFieldId { ref page } if page == "p"));
}

#[test]
fn duplicate_ids_block_import() {
    let mut value: serde_json::Value = serde_json::from_str(order_form_json()).expect("json");
    let pages = value["pages"].as_array_mut().expect("pages");
    pages[1]["fields"]
        .as_array_mut()
        .expect("fields")
        .push(json!({ "id": "email", "type": "email", "label": "Second email" }));

    let err = import_value(value).unwrap_err();
    assert!(matches!(err, ImportError::DuplicateFieldId(ref id) if id == "email"));
}

#[test]
fn appending_fields_keeps_ids_unique() {
    let mut spec = import_form(order_form_json());
    spec.append_field(Field {
        label: "Phone".into(),
        ..Field::new("phone", FieldType::Text)
    })
    .expect("append");
    assert_eq!(spec.pages[1].fields.last().map(|f| f.id.as_str()), Some("phone"));

    let before = spec.clone();
    let err = spec.append_field(Field::new("name", FieldType::Text)).unwrap_err();
    assert!(matches!(err, ImportError::DuplicateFieldId(ref id) if id == "name"));
    assert_eq!(spec, before);
}

#[test]
fn appending_to_an_empty_form_creates_a_page() {
    let mut spec = FormSpec {
        id: "blank".into(),
        ..FormSpec::default()
    };
    spec.append_field(Field::new("first", FieldType::Text)).expect("append");
    assert_eq!(spec.pages.len(), 1);
    assert_eq!(spec.pages[0].id, "page-1");
}

#[test]
fn imported_snippets_get_a_fresh_id() {
    let mut spec = import_form(order_form_json());
    let snippet = match import_document(r#"{"id":"email","type":"email","label":"Backup email"}"#)
        .expect("import")
    {
        ImportedDocument::Field(field) => field,
        other => panic!("expected a field, got {:?}", other),
    };

    let id = spec.import_field(snippet);
    assert!(id.starts_with("field-"), "{}", id);
    assert_eq!(id.len(), "field-".len() + 9);
    assert_eq!(spec.fields().count(), 13);
    assert_eq!(spec.label_for(&id), Some("Backup email"));
    assert_eq!(spec.label_for("email"), Some("Email"));
    assert!(spec.duplicate_field_ids().is_empty());
}

#[test]
fn templates_can_be_imported_twice() {
    let first = import_document(order_form_json())
        .expect("import")
        .with_fresh_id();
    let second = import_document(order_form_json())
        .expect("import")
        .with_fresh_id();
    let (ImportedDocument::Form(first), ImportedDocument::Form(second)) = (first, second) else {
        panic!("expected two forms");
    };
    assert!(first.id.starts_with("form-"));
    assert_ne!(first.id, second.id);
    assert_eq!(first.pages, second.pages);
}

#[test]
fn templates_without_an_id_are_accepted() {
    let spec = import_form(r#"{"title":"Untitled","pages":[{"id":"p","fields":[]}]}"#);
    assert!(spec.id.starts_with("form-"), "{}", spec.id);
    assert_eq!(spec.title, "Untitled");
}

#[test]
fn unknown_formula_references_are_listed() {
    let mut spec = import_form(order_form_json());
    assert!(spec.unknown_formula_references().is_empty());

    let mut shipping = Field::new("shipping", FieldType::Calculation);
    shipping.formula = Some("{field:total} + {field:postage}".into());
    spec.append_field(shipping).expect("append");
    assert_eq!(
        spec.unknown_formula_references(),
        vec![("shipping".to_string(), "postage".to_string())]
    );
}

#[test]
fn labels_fall_back_to_admin_label_and_id() {
    let spec = import_form(order_form_json());
    assert_eq!(spec.label_for("qty"), Some("Quantity"));
    assert_eq!(spec.label_for("missing"), None);

    let mut unlabeled = Field::new("code", FieldType::Text);
    unlabeled.admin_label = Some("Code (admin)".into());
    assert_eq!(unlabeled.display_label(), "Code (admin)");
    unlabeled.admin_label = None;
    assert_eq!(unlabeled.display_label(), "code");

    let labels = spec.labels();
    assert_eq!(labels["total"], "Total");
    assert_eq!(labels.len(), 12);
}
