//! Feature configuration.
//!
//! A [`FeatureConfig`] describes one feature built on the reactive core (the
//! resource catalogue, the checklist): which collections it uses, which web
//! service methods persist it, which forms and templates its components use,
//! and which row attributes/fields make up its entities. The generic
//! container, category and item components are parameterised by it.

use serde::{Deserialize, Serialize};

use crate::{
    Result,
    component::ComponentError,
    constants::{
        CATEGORIES, CATEGORY_ID, CHECKLIST_CATEGORIES, CHECKLIST_ITEMS, ITEMS, SORTORDER,
    },
};

/// How sibling entities are ordered within a parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OrderingSource {
    /// Relative order of the children's `sortorder` field
    SortOrder,
    /// Ordered id list stored on the parent record
    ParentList { field: String },
}

/// Type of an attribute/field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Int,
    Flag,
    Text,
    /// Comma separated integers
    IdList,
}

/// One entity field and the `data-*` attribute that carries it in the
/// server-rendered markup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub field: String,
    pub attribute: String,
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
    /// Shown in the component fragment and patched in place on change
    #[serde(default)]
    pub display: bool,
}

impl FieldSpec {
    pub fn new(field: &str, attribute: &str, kind: FieldKind) -> Self {
        Self {
            field: field.to_owned(),
            attribute: attribute.to_owned(),
            kind,
            required: false,
            display: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn displayed(mut self) -> Self {
        self.display = true;
        self
    }
}

/// Web service method names used by the built-in mutations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteMethods {
    pub create_category: String,
    pub update_category: String,
    pub delete_category: String,
    pub create_item: String,
    pub update_item: String,
    pub delete_item: String,
    pub reorder_categories: String,
    pub reorder_items: String,
}

impl RemoteMethods {
    fn for_prefix(category: &str, item: &str, items: &str) -> Self {
        Self {
            create_category: format!("mod_bookit_create_{category}"),
            update_category: format!("mod_bookit_update_{category}"),
            delete_category: format!("mod_bookit_delete_{category}"),
            create_item: format!("mod_bookit_create_{item}"),
            update_item: format!("mod_bookit_update_{item}"),
            delete_item: format!("mod_bookit_delete_{item}"),
            reorder_categories: format!("mod_bookit_reorder_{category}s"),
            reorder_items: format!("mod_bookit_reorder_{items}"),
        }
    }

    fn all(&self) -> [(&'static str, &str); 8] {
        [
            ("create_category", &self.create_category),
            ("update_category", &self.update_category),
            ("delete_category", &self.delete_category),
            ("create_item", &self.create_item),
            ("update_item", &self.update_item),
            ("delete_item", &self.delete_item),
            ("reorder_categories", &self.reorder_categories),
            ("reorder_items", &self.reorder_items),
        ]
    }
}

/// Modal form classes for editing categories and items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormClasses {
    pub category: String,
    pub item: String,
}

/// Template names for each component level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateNames {
    pub container: String,
    pub category: String,
    pub item: String,
}

/// Item fields used by the room/role visibility filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterFields {
    pub room: String,
    pub role: String,
}

impl Default for FilterFields {
    fn default() -> Self {
        Self {
            room: "roomids".to_owned(),
            role: "roleids".to_owned(),
        }
    }
}

/// Everything that distinguishes one feature from another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// Feature name, used in logs
    pub name: String,
    /// Frankenstyle component used for string lookups
    pub component: String,
    /// Collection holding the categories
    pub categories: String,
    /// Collection holding the items
    pub items: String,
    /// Item field referencing the owning category
    pub foreign_key: String,
    pub category_ordering: OrderingSource,
    pub item_ordering: OrderingSource,
    pub methods: RemoteMethods,
    pub forms: FormClasses,
    pub templates: TemplateNames,
    pub category_fields: Vec<FieldSpec>,
    pub item_fields: Vec<FieldSpec>,
    #[serde(default)]
    pub filters: FilterFields,
}

impl FeatureConfig {
    /// The resource catalogue: categories of bookable resources
    pub fn resources() -> Self {
        Self {
            name: "resources".to_owned(),
            component: "mod_bookit".to_owned(),
            categories: CATEGORIES.to_owned(),
            items: ITEMS.to_owned(),
            foreign_key: CATEGORY_ID.to_owned(),
            category_ordering: OrderingSource::SortOrder,
            item_ordering: OrderingSource::SortOrder,
            methods: RemoteMethods::for_prefix("resource_category", "resource", "resources"),
            forms: FormClasses {
                category: "mod_bookit\\form\\edit_resource_category_form".to_owned(),
                item: "mod_bookit\\form\\edit_resource_form".to_owned(),
            },
            templates: TemplateNames {
                container: "mod_bookit/resources/container".to_owned(),
                category: "mod_bookit/resources/category".to_owned(),
                item: "mod_bookit/resources/item".to_owned(),
            },
            category_fields: common_category_fields(),
            item_fields: {
                let mut fields = common_item_fields();
                fields.push(
                    FieldSpec::new("amount", "data-item-amount", FieldKind::Int).displayed(),
                );
                fields.push(FieldSpec::new(
                    "amountirrelevant",
                    "data-item-amountirrelevant",
                    FieldKind::Flag,
                ));
                fields
            },
            filters: FilterFields::default(),
        }
    }

    /// The checklist: categories carry the ordered list of their items
    pub fn checklist() -> Self {
        let mut category_fields = common_category_fields();
        category_fields.push(FieldSpec::new("items", "data-items", FieldKind::IdList));

        let mut item_fields = common_item_fields();
        item_fields.push(FieldSpec::new("resourceid", "data-item-resourceid", FieldKind::Int));
        item_fields
            .push(FieldSpec::new("duedate", "data-item-duedate", FieldKind::Int).displayed());
        item_fields.push(FieldSpec::new("duedatetype", "data-item-duedatetype", FieldKind::Text));
        item_fields.push(FieldSpec::new("roomids", "data-item-roomids", FieldKind::IdList));
        item_fields.push(FieldSpec::new("roleids", "data-item-roleids", FieldKind::IdList));

        Self {
            name: "checklist".to_owned(),
            component: "mod_bookit".to_owned(),
            categories: CHECKLIST_CATEGORIES.to_owned(),
            items: CHECKLIST_ITEMS.to_owned(),
            foreign_key: CATEGORY_ID.to_owned(),
            category_ordering: OrderingSource::SortOrder,
            item_ordering: OrderingSource::ParentList {
                field: "items".to_owned(),
            },
            methods: RemoteMethods::for_prefix(
                "checklist_category",
                "checklist_item",
                "checklist_items",
            ),
            forms: FormClasses {
                category: "mod_bookit\\form\\edit_checklist_category_form".to_owned(),
                item: "mod_bookit\\form\\edit_checklist_item_form".to_owned(),
            },
            templates: TemplateNames {
                container: "mod_bookit/checklist/container".to_owned(),
                category: "mod_bookit/checklist/category".to_owned(),
                item: "mod_bookit/checklist/item".to_owned(),
            },
            category_fields,
            item_fields,
            filters: FilterFields::default(),
        }
    }

    /// Look up a preset by name
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "resources" => Some(Self::resources()),
            "checklist" => Some(Self::checklist()),
            _ => None,
        }
    }

    /// Parse a configuration from JSON and validate it
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that cannot work
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| -> crate::Error {
            ComponentError::InvalidConfig {
                feature: self.name.clone(),
                reason,
            }
            .into()
        };

        for (what, value) in [
            ("categories", &self.categories),
            ("items", &self.items),
            ("foreign_key", &self.foreign_key),
            ("forms.category", &self.forms.category),
            ("forms.item", &self.forms.item),
            ("templates.container", &self.templates.container),
            ("templates.category", &self.templates.category),
            ("templates.item", &self.templates.item),
        ] {
            if value.trim().is_empty() {
                return Err(invalid(format!("{what} must not be empty")));
            }
        }
        for (what, method) in self.methods.all() {
            if method.trim().is_empty() {
                return Err(invalid(format!("methods.{what} must not be empty")));
            }
        }
        if self.categories == self.items {
            return Err(invalid("categories and items must be different collections".to_owned()));
        }
        if let OrderingSource::ParentList { field } = &self.item_ordering {
            if !self.category_fields.iter().any(|f| &f.field == field) {
                return Err(invalid(format!(
                    "item ordering list '{field}' is not a category field"
                )));
            }
        }
        if self.category_ordering != OrderingSource::SortOrder {
            return Err(invalid("categories can only be ordered by sortorder".to_owned()));
        }
        for fields in [&self.category_fields, &self.item_fields] {
            for (i, spec) in fields.iter().enumerate() {
                if fields[..i].iter().any(|other| other.attribute == spec.attribute) {
                    return Err(invalid(format!("duplicate attribute '{}'", spec.attribute)));
                }
            }
        }
        if !self.item_fields.iter().any(|f| f.field == self.foreign_key) {
            return Err(invalid(format!(
                "item fields must include the foreign key '{}'",
                self.foreign_key
            )));
        }
        Ok(())
    }

    /// Ordering field list name for item scopes, if items are ordered by a parent list
    pub fn item_list_field(&self) -> Option<&str> {
        match &self.item_ordering {
            OrderingSource::ParentList { field } => Some(field),
            OrderingSource::SortOrder => None,
        }
    }

    pub fn category_attribute_id(&self) -> &'static str {
        "data-categoryid"
    }

    pub fn item_attribute_id(&self) -> &'static str {
        "data-itemid"
    }
}

fn common_category_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::new("name", "data-name", FieldKind::Text)
            .required()
            .displayed(),
        FieldSpec::new("description", "data-description", FieldKind::Text).displayed(),
        FieldSpec::new(SORTORDER, "data-sortorder", FieldKind::Int),
        FieldSpec::new("active", "data-active", FieldKind::Flag).displayed(),
    ]
}

fn common_item_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::new("name", "data-name", FieldKind::Text)
            .required()
            .displayed(),
        FieldSpec::new("description", "data-description", FieldKind::Text).displayed(),
        FieldSpec::new(CATEGORY_ID, "data-item-categoryid", FieldKind::Int).required(),
        FieldSpec::new(SORTORDER, "data-sortorder", FieldKind::Int),
        FieldSpec::new("active", "data-active", FieldKind::Flag).displayed(),
    ]
}
