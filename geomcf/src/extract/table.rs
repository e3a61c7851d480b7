use lazy_static::lazy_static;

/// Where to find one logical property in a source document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyPath {
    pub name: &'static str,
    pub primary: String,
    /// Tried only when `primary` yields nothing
    pub fallback: Option<String>,
}

/// How a property lands in the `metadata` section of the generated MCF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct McfField {
    pub key: &'static str,
    pub property: &'static str,
    /// Always emitted as a list, even for a single match
    pub list: bool,
}

/// Lookup paths for every extracted property.
#[derive(Debug, Clone)]
pub struct PathTable {
    entries: Vec<PropertyPath>,
}

lazy_static! {
    static ref ISO19139: PathTable = PathTable::build_iso19139();
}

const IDENT: &str = "identificationInfo/MD_DataIdentification";
const CITATION: &str = "identificationInfo/MD_DataIdentification/citation/CI_Citation";
const POINT_OF_CONTACT: &str =
    "identificationInfo/MD_DataIdentification/pointOfContact/CI_ResponsibleParty";
const BBOX: &str =
    "identificationInfo/MD_DataIdentification/extent/EX_Extent/geographicElement/EX_GeographicBoundingBox";
const TIME_PERIOD: &str =
    "identificationInfo/MD_DataIdentification/extent/EX_Extent/temporalElement/EX_TemporalExtent/extent/TimePeriod";

impl PathTable {
    pub fn new(entries: Vec<PropertyPath>) -> Self {
        PathTable { entries }
    }

    /// Paths for ISO 19139 records, including the `ExtensionBlock`
    /// distribution block used by national profiles.
    pub fn iso19139() -> &'static PathTable {
        &ISO19139
    }

    fn build_iso19139() -> Self {
        let mut entries = Vec::new();
        let mut add = |name: &'static str, primary: String, fallback: Option<String>| {
            entries.push(PropertyPath {
                name,
                primary,
                fallback,
            });
        };

        add(
            "metadata_language",
            "language/CharacterString".into(),
            Some("language/LanguageCode/@codeListValue".into()),
        );
        add("fileIdentifier", "fileIdentifier/CharacterString".into(), None);
        add(
            "hierarchyLevel",
            "hierarchyLevel/MD_ScopeCode".into(),
            Some("hierarchyLevel/MD_ScopeCode/@codeListValue".into()),
        );
        add(
            "meta_organization_name",
            "contact/CI_ResponsibleParty/organisationName/CharacterString".into(),
            None,
        );
        add(
            "meta_organisation_emailAddress",
            "contact/CI_ResponsibleParty/contactInfo/CI_Contact/address/CI_Address/electronicMailAddress/CharacterString".into(),
            None,
        );
        add("dateStamp", "dateStamp/Date".into(), Some("dateStamp/DateTime".into()));
        add(
            "metadataStandardName",
            "metadataStandardName/CharacterString".into(),
            None,
        );
        add(
            "metadataStandardVersion",
            "metadataStandardVersion/CharacterString".into(),
            None,
        );
        add("title", format!("{CITATION}/title/CharacterString"), None);
        add(
            "publish_date",
            format!("{CITATION}/date/CI_Date/date/DateTime"),
            Some(format!("{CITATION}/date/CI_Date/date/Date")),
        );
        add(
            "dateTypeCode",
            format!("{CITATION}/date/CI_Date/dateType/CI_DateTypeCode"),
            Some(format!(
                "{CITATION}/date/CI_Date/dateType/CI_DateTypeCode/@codeListValue"
            )),
        );
        add(
            "RS_Identifier",
            format!("{CITATION}/identifier/RS_Identifier/code/CharacterString"),
            None,
        );
        add(
            "RS_Identifier_codeSpace",
            format!("{CITATION}/identifier/RS_Identifier/codeSpace/CharacterString"),
            None,
        );
        add("abstract", format!("{IDENT}/abstract/CharacterString"), None);
        add(
            "organisationName",
            format!("{POINT_OF_CONTACT}/organisationName/CharacterString"),
            None,
        );
        add(
            "organisation_emailAddress",
            format!(
                "{POINT_OF_CONTACT}/contactInfo/CI_Contact/address/CI_Address/electronicMailAddress/CharacterString"
            ),
            None,
        );
        add(
            "organisation_role",
            format!("{POINT_OF_CONTACT}/role/CI_RoleCode"),
            Some(format!("{POINT_OF_CONTACT}/role/CI_RoleCode/@codeListValue")),
        );
        add(
            "dist_contact_org",
            "ExtensionBlock/Distribution/distributor/organisationName/CharacterString".into(),
            None,
        );
        add(
            "dist_email",
            "ExtensionBlock/Distribution/distributor/emailAddress/CharacterString".into(),
            None,
        );
        add(
            "dist_format",
            "ExtensionBlock/Distribution/distributionFormat/CharacterString".into(),
            None,
        );
        add(
            "descriptiveKeywords",
            format!("{IDENT}/descriptiveKeywords/MD_Keywords/keyword/CharacterString"),
            None,
        );
        add(
            "useLimitation",
            format!("{IDENT}/resourceConstraints/MD_Constraints/useLimitation/CharacterString"),
            None,
        );
        add(
            "accessConstraints",
            format!("{IDENT}/resourceConstraints/MD_LegalConstraints/accessConstraints/MD_RestrictionCode"),
            Some(format!(
                "{IDENT}/resourceConstraints/MD_LegalConstraints/accessConstraints/MD_RestrictionCode/@codeListValue"
            )),
        );
        add(
            "otherConstraints",
            format!("{IDENT}/resourceConstraints/MD_LegalConstraints/otherConstraints/CharacterString"),
            None,
        );
        add(
            "denominator",
            format!(
                "{IDENT}/spatialResolution/MD_Resolution/equivalentScale/MD_RepresentativeFraction/denominator/Integer"
            ),
            None,
        );
        add(
            "distance",
            format!("{IDENT}/spatialResolution/MD_Resolution/distance/Distance"),
            None,
        );
        add(
            "resourceLanguage",
            format!("{IDENT}/language/LanguageCode"),
            Some(format!("{IDENT}/language/LanguageCode/@codeListValue")),
        );
        add(
            "inspireCategory",
            format!("{IDENT}/topicCategory/MD_TopicCategoryCode"),
            None,
        );
        add("westBoundLongitude", format!("{BBOX}/westBoundLongitude/Decimal"), None);
        add("eastBoundLongitude", format!("{BBOX}/eastBoundLongitude/Decimal"), None);
        add("southBoundLatitude", format!("{BBOX}/southBoundLatitude/Decimal"), None);
        add("northBoundLatitude", format!("{BBOX}/northBoundLatitude/Decimal"), None);
        add("t_extnt_beginPosition", format!("{TIME_PERIOD}/beginPosition"), None);
        add("t_extnt_endPosition", format!("{TIME_PERIOD}/endPosition"), None);
        add(
            "linkage",
            "distributionInfo/MD_Distribution/transferOptions/MD_DigitalTransferOptions/onLine/CI_OnlineResource/linkage/URL".into(),
            None,
        );
        add(
            "lineage",
            "dataQualityInfo/DQ_DataQuality/lineage/LI_Lineage/statement/CharacterString".into(),
            None,
        );

        PathTable { entries }
    }

    pub fn get(&self, name: &str) -> Option<&PropertyPath> {
        self.entries.iter().find(|entry| entry.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PropertyPath> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Property → `metadata` key mapping for generated MCF files, in output order.
pub const MCF_FIELDS: &[McfField] = &[
    field("identifier", "fileIdentifier"),
    field("language", "metadata_language"),
    field("hierarchylevel", "hierarchyLevel"),
    field("organization_name", "meta_organization_name"),
    field("organisation_emailAddress", "meta_organisation_emailAddress"),
    field("datestamp", "dateStamp"),
    field("metadataStandardName", "metadataStandardName"),
    field("metadataStandardVersion", "metadataStandardVersion"),
    field("title", "title"),
    field("publish_date", "publish_date"),
    field("dateTypeCode", "dateTypeCode"),
    field("resourceIdentifier", "RS_Identifier"),
    field("resourceIdentifierNamespace", "RS_Identifier_codeSpace"),
    field("abstract", "abstract"),
    field("resp_organisationName", "organisationName"),
    field("resp_organisation_emailAddress", "organisation_emailAddress"),
    field("resp_organisation_role", "organisation_role"),
    field("keywords", "descriptiveKeywords"),
    field("useLimitation", "useLimitation"),
    field("accessConstraints", "accessConstraints"),
    field("otherConstraints", "otherConstraints"),
    field("denominator", "denominator"),
    field("distance", "distance"),
    field("resourceLanguage", "resourceLanguage"),
    McfField {
        key: "inspireCategory",
        property: "inspireCategory",
        list: true,
    },
    field("bounding_box_w", "westBoundLongitude"),
    field("bounding_box_e", "eastBoundLongitude"),
    field("bounding_box_s", "southBoundLatitude"),
    field("bounding_box_n", "northBoundLatitude"),
    field("t_extnt_beginPosition", "t_extnt_beginPosition"),
    field("t_extnt_endPosition", "t_extnt_endPosition"),
    field("dist_contact_org", "dist_contact_org"),
    field("dist_email", "dist_email"),
    field("dist_format", "dist_format"),
    field("linkage", "linkage"),
    field("lineage", "lineage"),
];

const fn field(key: &'static str, property: &'static str) -> McfField {
    McfField {
        key,
        property,
        list: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_every_mcf_field_has_a_path() {
        let table = PathTable::iso19139();
        for field in MCF_FIELDS {
            assert!(
                table.get(field.property).is_some(),
                "no path for property '{}'",
                field.property
            );
        }
    }

    #[test]
    fn test_property_names_are_unique() {
        let table = PathTable::iso19139();
        let names: HashSet<_> = table.iter().map(|entry| entry.name).collect();
        assert_eq!(names.len(), table.len());

        let keys: HashSet<_> = MCF_FIELDS.iter().map(|field| field.key).collect();
        assert_eq!(keys.len(), MCF_FIELDS.len());
    }

    #[test]
    fn test_code_list_fallbacks() {
        let table = PathTable::iso19139();
        let role = table.get("organisation_role").unwrap();
        assert!(role.fallback.as_deref().unwrap().ends_with("/@codeListValue"));
        assert!(table.get("title").unwrap().fallback.is_none());
    }
}
