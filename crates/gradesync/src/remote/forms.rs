//! Form payloads for the gradebook's edit endpoints.
//!
//! Field names and fixed values mirror what the gradebook's own forms post.
//! Grade type 1 is "value"; minimum grade is always 0.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};

use crate::tree::{GlobalGradeConfig, RemoteId};

use super::CourseId;

/// Characters left as-is by `application/x-www-form-urlencoded`.
const FORM_ENCODE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'*')
    .remove(b'-')
    .remove(b'.')
    .remove(b'_');

/// Dynamic form class names the AJAX service instantiates.
pub const ADD_CATEGORY_FORM: &str = "core_grades\\form\\add_category";
pub const ADD_ITEM_FORM: &str = "core_grades\\form\\add_item";

/// Ordered form fields. Values are owned so numbers can be formatted once.
pub type Fields = Vec<(&'static str, String)>;

fn flag(value: bool) -> String {
    if value { "1" } else { "0" }.to_string()
}

/// Formats a grade the way the forms render them (no trailing `.0` noise).
fn number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

fn tree_context(course: CourseId, sesskey: &SecretString) -> Fields {
    vec![
        ("courseid", course.to_string()),
        ("gpr_type", "edit".to_string()),
        ("gpr_plugin", "tree".to_string()),
        ("gpr_courseid", course.to_string()),
        ("sesskey", sesskey.expose_secret().to_string()),
    ]
}

/// Fields of the add-category dynamic form. A missing parent means the
/// course root.
pub fn add_category(
    course: CourseId,
    sesskey: &SecretString,
    name: &str,
    parent: Option<RemoteId>,
    config: &GlobalGradeConfig,
) -> Fields {
    let mut fields: Fields = vec![("id", "0".to_string())];
    fields.extend(tree_context(course, sesskey));
    fields.extend([
        ("category", "-1".to_string()),
        ("_qf__core_grades_form_add_category", "1".to_string()),
        ("fullname", name.to_string()),
        ("aggregation", config.aggregation.code().to_string()),
        ("aggregateonlygraded", flag(config.only_graded)),
        ("droplow", "0".to_string()),
        ("grade_item_gradetype", "1".to_string()),
        ("grade_item_grademax", number(config.grade_max)),
        ("grade_item_grademin", "0".to_string()),
        ("grade_item_gradepass", number(config.grade_pass)),
        ("grade_item_weightoverride", "0".to_string()),
    ]);
    if let Some(parent) = parent {
        fields.push(("parentcategory", parent.number().to_string()));
    }
    fields
}

/// Fields of the add-item dynamic form.
pub fn add_item(
    course: CourseId,
    sesskey: &SecretString,
    name: &str,
    parent: RemoteId,
    config: &GlobalGradeConfig,
    id_number: Option<&str>,
) -> Fields {
    let mut fields: Fields = vec![("id", "0".to_string())];
    fields.extend(tree_context(course, sesskey));
    fields.extend([
        ("itemid", "-1".to_string()),
        ("itemtype", "manual".to_string()),
        ("_qf__core_grades_form_add_item", "1".to_string()),
        ("itemname", name.to_string()),
    ]);
    if let Some(id_number) = id_number.filter(|s| !s.is_empty()) {
        fields.push(("idnumber", id_number.to_string()));
    }
    fields.extend([
        ("gradetype", "1".to_string()),
        ("grademax", number(config.grade_max)),
        ("grademin", "0".to_string()),
        ("gradepass", number(config.grade_pass)),
        ("hidden", "0".to_string()),
        ("locked", "0".to_string()),
        ("parentcategory", parent.number().to_string()),
    ]);
    fields
}

/// Fields posted to `category.php`. The grade settings live on the
/// category's own grade item, hence the `grade_item_` prefixes.
pub fn edit_category(
    course: CourseId,
    sesskey: &SecretString,
    id: RemoteId,
    name: &str,
    config: &GlobalGradeConfig,
    coefficient: f64,
) -> Fields {
    let mut fields: Fields = vec![("id", id.number().to_string())];
    fields.extend(tree_context(course, sesskey));
    fields.extend([
        ("_qf__edit_category_form", "1".to_string()),
        ("mform_isexpanded_id_headercategory", "1".to_string()),
        ("fullname", name.to_string()),
        ("aggregation", config.aggregation.code().to_string()),
        ("aggregateonlygraded", flag(config.only_graded)),
        ("droplow", "0".to_string()),
        ("grade_item_gradetype", "1".to_string()),
        ("grade_item_grademax", number(config.grade_max)),
        ("grade_item_grademin", "0".to_string()),
        ("grade_item_gradepass", number(config.grade_pass)),
        ("grade_item_aggregationcoef", number(coefficient)),
        ("grade_item_weightoverride", "0".to_string()),
        ("submitbutton", "Save changes".to_string()),
    ]);
    fields
}

/// Fields posted to `item.php`.
pub fn edit_item(
    course: CourseId,
    sesskey: &SecretString,
    id: RemoteId,
    name: &str,
    config: &GlobalGradeConfig,
    id_number: Option<&str>,
    coefficient: f64,
) -> Fields {
    let mut fields: Fields = vec![("id", id.number().to_string())];
    fields.extend(tree_context(course, sesskey));
    fields.extend([
        ("itemtype", "manual".to_string()),
        ("_qf__edit_item_form", "1".to_string()),
        ("mform_isexpanded_id_general", "1".to_string()),
        ("itemname", name.to_string()),
        ("iteminfo", String::new()),
        ("idnumber", id_number.unwrap_or_default().to_string()),
        ("gradetype", "1".to_string()),
        ("grademax", number(config.grade_max)),
        ("grademin", "0".to_string()),
        ("gradepass", number(config.grade_pass)),
        ("display", "0".to_string()),
        ("decimals", "-1".to_string()),
        ("hidden", "0".to_string()),
        ("locked", "0".to_string()),
        ("aggregationcoef", number(coefficient)),
        ("submitbutton", "Save changes".to_string()),
    ]);
    fields
}

/// Fields posted to `calculation.php`. An empty formula clears it.
pub fn calculation(
    course: CourseId,
    sesskey: &SecretString,
    id: RemoteId,
    formula: &str,
) -> Fields {
    let mut fields: Fields = vec![("id", id.number().to_string())];
    fields.extend(tree_context(course, sesskey));
    fields.extend([
        ("section", "calculation".to_string()),
        ("_qf__edit_calculation_form", "1".to_string()),
        ("mform_isexpanded_id_general", "1".to_string()),
        ("calculation", formula.to_string()),
        ("submitbutton", "Save changes".to_string()),
    ]);
    fields
}

/// Query for the tree page's delete action.
pub fn delete_query(course: CourseId, sesskey: &SecretString, id: RemoteId) -> Fields {
    vec![
        ("id", course.to_string()),
        ("action", "delete".to_string()),
        ("confirm", "1".to_string()),
        ("eid", id.to_string()),
        ("sesskey", sesskey.expose_secret().to_string()),
        ("gpr_type", "edit".to_string()),
        ("gpr_plugin", "tree".to_string()),
        ("gpr_courseid", course.to_string()),
    ]
}

/// URL-encodes fields into a query-string body.
pub fn encode(fields: &Fields) -> String {
    fields
        .iter()
        .map(|(key, value)| {
            format!(
                "{}={}",
                utf8_percent_encode(key, FORM_ENCODE),
                utf8_percent_encode(value, FORM_ENCODE)
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Wraps form data in the envelope the dynamic-form web service expects.
pub fn dynamic_form_request(form: &str, fields: &Fields) -> Value {
    json!([{
        "index": 0,
        "methodname": "core_form_dynamic_form",
        "args": {
            "formdata": encode(fields),
            "form": form,
        }
    }])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::AggregationMethod;

    fn field<'a>(fields: &'a Fields, key: &str) -> Option<&'a str> {
        fields
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    fn key() -> SecretString {
        SecretString::from("abc123")
    }

    fn config() -> GlobalGradeConfig {
        GlobalGradeConfig {
            aggregation: AggregationMethod::WeightedMean,
            only_graded: false,
            grade_max: 10.0,
            grade_pass: 5.5,
        }
    }

    #[test]
    fn test_add_category_fields() {
        let fields = add_category(
            CourseId(42),
            &key(),
            "RA1",
            Some(RemoteId::category(900)),
            &config(),
        );
        assert_eq!(field(&fields, "fullname"), Some("RA1"));
        assert_eq!(field(&fields, "aggregation"), Some("10"));
        assert_eq!(field(&fields, "aggregateonlygraded"), Some("0"));
        assert_eq!(field(&fields, "grade_item_grademax"), Some("10"));
        assert_eq!(field(&fields, "grade_item_gradepass"), Some("5.5"));
        assert_eq!(field(&fields, "parentcategory"), Some("900"));
        assert_eq!(field(&fields, "sesskey"), Some("abc123"));
    }

    #[test]
    fn test_add_category_without_parent() {
        let fields = add_category(CourseId(42), &key(), "RA", None, &config());
        assert_eq!(field(&fields, "parentcategory"), None);
    }

    #[test]
    fn test_add_item_idnumber_only_when_present() {
        let parent = RemoteId::category(5);
        let with = add_item(CourseId(1), &key(), "CE1.1", parent, &config(), Some("ce11"));
        assert_eq!(field(&with, "idnumber"), Some("ce11"));
        assert_eq!(field(&with, "parentcategory"), Some("5"));

        let without = add_item(CourseId(1), &key(), "CE1.1", parent, &config(), Some(""));
        assert_eq!(field(&without, "idnumber"), None);
    }

    #[test]
    fn test_edit_forms_carry_coefficient() {
        let cat = edit_category(
            CourseId(1),
            &key(),
            RemoteId::category(7),
            "RA1",
            &config(),
            40.0,
        );
        assert_eq!(field(&cat, "id"), Some("7"));
        assert_eq!(field(&cat, "grade_item_aggregationcoef"), Some("40"));

        let item = edit_item(
            CourseId(1),
            &key(),
            RemoteId::item(8),
            "CE",
            &config(),
            None,
            2.5,
        );
        assert_eq!(field(&item, "aggregationcoef"), Some("2.5"));
        assert_eq!(field(&item, "idnumber"), Some(""));
    }

    #[test]
    fn test_delete_query_uses_full_token() {
        let query = delete_query(CourseId(3), &key(), RemoteId::item(77));
        assert_eq!(field(&query, "eid"), Some("ig77"));
        assert_eq!(field(&query, "id"), Some("3"));
    }

    #[test]
    fn test_encode_escapes_reserved_characters() {
        let fields: Fields = vec![("fullname", "RA 1 & co=2".into()), ("calculation", "=[[a]]*2".into())];
        assert_eq!(
            encode(&fields),
            "fullname=RA%201%20%26%20co%3D2&calculation=%3D%5B%5Ba%5D%5D*2"
        );
    }

    #[test]
    fn test_dynamic_form_envelope() {
        let fields: Fields = vec![("id", "0".into())];
        let request = dynamic_form_request(ADD_ITEM_FORM, &fields);
        assert_eq!(request[0]["methodname"], "core_form_dynamic_form");
        assert_eq!(request[0]["args"]["form"], "core_grades\\form\\add_item");
        assert_eq!(request[0]["args"]["formdata"], "id=0");
    }
}
