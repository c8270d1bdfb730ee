//! Base types of the target runtime and the spellings accepted for them.

/// Canonical base type names.
pub const BASE_TYPES: &[&str] = &[
    "NOTHING",
    "STRING",
    "NUMBER",
    "INTEGER",
    "LONG",
    "BOOLEAN",
    "DATETIME",
    "TIMESPAN",
    "INFOTABLE",
    "LOCATION",
    "XML",
    "JSON",
    "QUERY",
    "IMAGE",
    "HYPERLINK",
    "IMAGELINK",
    "PASSWORD",
    "HTML",
    "TEXT",
    "TAGS",
    "SCHEDULE",
    "VARIANT",
    "GUID",
    "BLOB",
    "THINGNAME",
    "THINGSHAPENAME",
    "THINGTEMPLATENAME",
    "DATASHAPENAME",
    "MASHUPNAME",
    "MENUNAME",
    "BASETYPENAME",
    "USERNAME",
    "GROUPNAME",
    "CATEGORYNAME",
    "STATEDEFINITIONNAME",
    "STYLEDEFINITIONNAME",
    "MODELTAGVOCABULARYNAME",
    "DATATAGVOCABULARYNAME",
    "NETWORKNAME",
    "MEDIAENTITYNAME",
    "APPLICATIONKEYNAME",
    "LOCALIZATIONTABLENAME",
    "ORGANIZATIONNAME",
    "DASHBOARDNAME",
    "PERSISTENCEPROVIDERPACKAGENAME",
    "PERSISTENCEPROVIDERNAME",
    "PROJECTNAME",
    "NOTIFICATIONCONTENTNAME",
    "NOTIFICATIONDEFINITIONNAME",
    "STYLETHEMENAME",
    "FIELDNAME",
    "PROPERTYNAME",
    "SERVICENAME",
    "EVENTNAME",
    "THINGGROUPNAME",
    "THINGCODE",
    "VEC2",
    "VEC3",
    "VEC4",
    "ENCRYPTED_STRING",
];

/// Alternative spellings that are not simply the canonical name.
const SYNONYMS: &[(&str, &str)] = &[
    ("string", "STRING"),
    ("number", "NUMBER"),
    ("boolean", "BOOLEAN"),
    ("void", "NOTHING"),
    ("undefined", "NOTHING"),
    ("Date", "DATETIME"),
    ("date", "DATETIME"),
    ("TWJSON", "JSON"),
    ("twjson", "JSON"),
    ("object", "JSON"),
    ("any", "VARIANT"),
    ("InfoTable", "INFOTABLE"),
    ("Infotable", "INFOTABLE"),
    ("Location", "LOCATION"),
    ("Tags", "TAGS"),
    ("DataTags", "TAGS"),
    ("ModelTags", "TAGS"),
    ("Schedule", "SCHEDULE"),
    ("Timespan", "TIMESPAN"),
    ("TimeSpan", "TIMESPAN"),
    ("Query", "QUERY"),
    ("Blob", "BLOB"),
    ("Guid", "GUID"),
    ("Password", "PASSWORD"),
    ("Image", "IMAGE"),
    ("Hyperlink", "HYPERLINK"),
    ("ImageLink", "IMAGELINK"),
    ("Html", "HTML"),
    ("Text", "TEXT"),
    ("Variant", "VARIANT"),
    ("ThingName", "THINGNAME"),
    ("ThingTemplateName", "THINGTEMPLATENAME"),
    ("ThingShapeName", "THINGSHAPENAME"),
    ("DataShapeName", "DATASHAPENAME"),
    ("MashupName", "MASHUPNAME"),
    ("UserName", "USERNAME"),
    ("GroupName", "GROUPNAME"),
    ("OrganizationName", "ORGANIZATIONNAME"),
    ("ProjectName", "PROJECTNAME"),
    ("FieldName", "FIELDNAME"),
    ("Vec2", "VEC2"),
    ("Vec3", "VEC3"),
    ("Vec4", "VEC4"),
];

/// Resolves a type spelling to its canonical base type name.
///
/// Canonical names match case-insensitively; other synonyms match exactly.
pub fn base_type_named(name: &str) -> Option<&'static str> {
    if let Some((_, canonical)) = SYNONYMS.iter().find(|(spelling, _)| *spelling == name) {
        return Some(canonical);
    }
    let upper = name.to_ascii_uppercase();
    BASE_TYPES.iter().copied().find(|t| *t == upper)
}

/// Returns true for base types whose values are numbers.
pub fn is_numeric(base_type: &str) -> bool {
    matches!(base_type, "NUMBER" | "INTEGER" | "LONG")
}

/// Base types that may carry generic arguments naming other entities.
pub fn accepts_entity_arguments(base_type: &str) -> bool {
    matches!(base_type, "INFOTABLE" | "THINGNAME" | "THINGTEMPLATENAME")
}
