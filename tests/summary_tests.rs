use std::io::Cursor;

use notafiscal::archive::zip_files;
use notafiscal::core::{IdentitySet, ModelCode, Period};
use notafiscal::summary::{Role, detail_rollup, item_extract, summarize};

const OWN_ID: &str = "11222333000181";
const OTHER_OWN_ID: &str = "44555666000177";
const STRANGER_ID: &str = "99888777000166";

fn key(n: u64) -> String {
    format!("{n:044}")
}

fn nfe_xml(issuer: &str, recipient: &str, model: &str, key: &str) -> Vec<u8> {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<nfeProc xmlns="http://www.portalfiscal.inf.br/nfe">
  <NFe>
    <infNFe Id="NFe{key}">
      <ide><mod>{model}</mod><dhEmi>2024-06-15T10:00:00-03:00</dhEmi></ide>
      <emit><CNPJ>{issuer}</CNPJ></emit>
      <dest><CNPJ>{recipient}</CNPJ></dest>
      <det nItem="1"><prod><xProd>Parafuso</xProd><NCM>73181500</NCM><uCom>UN</uCom><CFOP>5102</CFOP></prod></det>
      <det nItem="2"><prod><xProd>Porca</xProd><NCM>73181600</NCM><uCom>UN</uCom><CFOP>5102</CFOP></prod></det>
    </infNFe>
  </NFe>
  <protNFe><infProt><chNFe>{key}</chNFe></infProt></protNFe>
</nfeProc>"#
    )
    .into_bytes()
}

fn event_xml() -> Vec<u8> {
    b"<procEventoNFe xmlns=\"http://www.portalfiscal.inf.br/nfe\"><evento/></procEventoNFe>".to_vec()
}

fn ids(list: &[&str]) -> IdentitySet {
    IdentitySet::new(list.iter().copied())
}

#[test]
fn duplicate_entries_count_once() {
    let doc = nfe_xml(OWN_ID, STRANGER_ID, "55", &key(1));
    // same bytes under two names
    let zipped = zip_files(&[
        ("a.xml".to_string(), doc.clone()),
        ("b.xml".to_string(), doc),
    ])
    .unwrap();

    let summary = summarize(Cursor::new(zipped), &ids(&[OWN_ID])).unwrap();
    let totals = &summary.totals;

    assert_eq!(totals.xml_entries, 2);
    assert_eq!(totals.counted_documents, 1);
    assert_eq!(totals.fiscal_documents, 1);
    assert_eq!(totals.duplicates, 1);
    assert_eq!(totals.events, 0);
    assert_eq!(totals.intercompany, 0);
    assert_eq!(totals.period_min, Some(Period::new(2024, 6)));
    assert_eq!(totals.period_max, Some(Period::new(2024, 6)));
    assert_eq!(totals.period_range(), "06/2024 - 06/2024");

    assert_eq!(summary.rows.len(), 1);
    let row = &summary.rows[0];
    assert_eq!(row.identity, "11.222.333/0001-81");
    assert_eq!(row.own_total, 1);
    assert_eq!(row.own.nfe_55, 1);
    assert_eq!(row.third_party_total, 0);
}

#[test]
fn roles_and_model_breakdown() {
    let zipped = zip_files(&[
        // issued by us
        ("1.xml".to_string(), nfe_xml(OWN_ID, STRANGER_ID, "55", &key(1))),
        ("2.xml".to_string(), nfe_xml(OWN_ID, STRANGER_ID, "65", &key(2))),
        // received by us
        ("3.xml".to_string(), nfe_xml(STRANGER_ID, OWN_ID, "55", &key(3))),
        // nothing to do with us
        ("4.xml".to_string(), nfe_xml(STRANGER_ID, "00111222000133", "55", &key(4))),
        ("ev.xml".to_string(), event_xml()),
    ])
    .unwrap();

    let summary = summarize(Cursor::new(zipped), &ids(&[OWN_ID])).unwrap();
    let totals = &summary.totals;

    assert_eq!(totals.xml_entries, 5);
    assert_eq!(totals.counted_documents, 4);
    assert_eq!(totals.fiscal_documents, 4);
    assert_eq!(totals.events, 1);
    assert_eq!(totals.unknown_other, 0);

    let row = &summary.rows[0];
    assert_eq!(row.own_total, 2);
    assert_eq!(row.own.nfe_55, 1);
    assert_eq!(row.own.nfce_65, 1);
    assert_eq!(row.third_party_total, 1);
    assert_eq!(row.third_party.nfe_55, 1);
}

#[test]
fn intercompany_attributed_to_issuer_only() {
    let zipped = zip_files(&[(
        "x.xml".to_string(),
        nfe_xml(OWN_ID, OTHER_OWN_ID, "55", &key(7)),
    )])
    .unwrap();

    let summary = summarize(Cursor::new(zipped), &ids(&[OWN_ID, OTHER_OWN_ID])).unwrap();

    assert_eq!(summary.totals.intercompany, 1);
    assert_eq!(summary.totals.counted_documents, 1);

    // counted once, under the issuer's Own breakdown
    let issuer_row = summary
        .rows
        .iter()
        .find(|r| r.identity == "11.222.333/0001-81")
        .unwrap();
    assert_eq!(issuer_row.own_total, 1);
    let recipient_row = summary
        .rows
        .iter()
        .find(|r| r.identity == "44.555.666/0001-77")
        .unwrap();
    assert_eq!(recipient_row.third_party_total, 0);
}

#[test]
fn unclassifiable_entries_roll_into_unknown_other() {
    let zipped = zip_files(&[
        ("doc.xml".to_string(), nfe_xml(OWN_ID, STRANGER_ID, "55", &key(1))),
        ("junk.xml".to_string(), b"<inventory/>".to_vec()),
        ("broken.xml".to_string(), b"<broken".to_vec()),
        ("readme.txt".to_string(), b"not xml".to_vec()),
    ])
    .unwrap();

    let summary = summarize(Cursor::new(zipped), &ids(&[OWN_ID])).unwrap();
    // the .txt entry is not an XML entry at all
    assert_eq!(summary.totals.xml_entries, 3);
    assert_eq!(summary.totals.fiscal_documents, 1);
    assert_eq!(summary.totals.unknown_other, 2);
}

#[test]
fn nested_zips_are_traversed_to_the_depth_bound() {
    let innermost = zip_files(&[(
        "deep.xml".to_string(),
        nfe_xml(OWN_ID, STRANGER_ID, "55", &key(9)),
    )])
    .unwrap();
    let level2 = zip_files(&[("z3.zip".to_string(), innermost)]).unwrap();
    let level1 = zip_files(&[("z2.zip".to_string(), level2)]).unwrap();
    let outer = zip_files(&[("z1.zip".to_string(), level1.clone())]).unwrap();

    // three nested levels: still visited
    let summary = summarize(Cursor::new(outer), &ids(&[OWN_ID])).unwrap();
    assert_eq!(summary.totals.xml_entries, 1);

    // four nested levels: the innermost zip is beyond the bound
    let too_deep = zip_files(&[(
        "z0.zip".to_string(),
        zip_files(&[("z1.zip".to_string(), level1)]).unwrap(),
    )])
    .unwrap();
    let summary = summarize(Cursor::new(too_deep), &ids(&[OWN_ID])).unwrap();
    assert_eq!(summary.totals.xml_entries, 0);
    assert_eq!(summary.totals.period_range(), "-");
}

#[test]
fn summarize_is_deterministic() {
    let zipped = zip_files(&[
        ("1.xml".to_string(), nfe_xml(OWN_ID, STRANGER_ID, "55", &key(1))),
        ("2.xml".to_string(), nfe_xml(STRANGER_ID, OWN_ID, "57", &key(2))),
    ])
    .unwrap();

    let first = summarize(Cursor::new(zipped.clone()), &ids(&[OWN_ID])).unwrap();
    let second = summarize(Cursor::new(zipped), &ids(&[OWN_ID])).unwrap();
    assert_eq!(first, second);
}

#[test]
fn non_zip_input_fails() {
    let err = summarize(Cursor::new(b"not a zip".to_vec()), &ids(&[OWN_ID]));
    assert!(err.is_err());
}

#[test]
fn detail_rollup_groups_by_cfop_and_period() {
    let zipped = zip_files(&[
        ("1.xml".to_string(), nfe_xml(OWN_ID, STRANGER_ID, "55", &key(1))),
        ("2.xml".to_string(), nfe_xml(OWN_ID, STRANGER_ID, "55", &key(2))),
        ("3.xml".to_string(), nfe_xml(STRANGER_ID, OWN_ID, "55", &key(3))),
    ])
    .unwrap();

    let rows = detail_rollup(Cursor::new(zipped), &ids(&[OWN_ID])).unwrap();
    assert_eq!(rows.len(), 2);

    let own = rows.iter().find(|r| r.role == Role::Own).unwrap();
    assert_eq!(own.identity, "11.222.333/0001-81");
    assert_eq!(own.model, ModelCode::Nfe55);
    assert_eq!(own.cfop, "5102");
    assert_eq!(own.month, Some(6));
    assert_eq!(own.year, Some(2024));
    assert_eq!(own.count, 2);

    let third = rows.iter().find(|r| r.role == Role::ThirdParty).unwrap();
    assert_eq!(third.count, 1);
}

#[test]
fn item_extract_dedups_by_key_and_item() {
    let doc = nfe_xml(OWN_ID, STRANGER_ID, "55", &key(5));
    let zipped = zip_files(&[
        ("a.xml".to_string(), doc.clone()),
        ("copy.xml".to_string(), doc),
        // CT-e carries no product items
        (
            "c.xml".to_string(),
            format!(
                r#"<cteProc xmlns="http://www.portalfiscal.inf.br/cte">
  <CTe><infCte Id="CTe{0}"><ide><mod>57</mod></ide><emit><CNPJ>{OWN_ID}</CNPJ></emit></infCte></CTe>
</cteProc>"#,
                key(6)
            )
            .into_bytes(),
        ),
    ])
    .unwrap();

    let rows = item_extract(Cursor::new(zipped), &ids(&[OWN_ID])).unwrap();
    assert_eq!(rows.len(), 2);

    assert_eq!(rows[0].product, "Parafuso");
    assert_eq!(rows[0].item_number, "1");
    assert_eq!(rows[0].ncm, "73181500");
    assert_eq!(rows[0].unit, "UN");
    assert_eq!(rows[0].cfop, "5102");
    assert_eq!(rows[0].key, key(5));
    assert_eq!(rows[0].role, Role::Own);
    assert_eq!(rows[0].issuer, "11.222.333/0001-81");
    assert_eq!(rows[0].recipient, "99.888.777/0001-66");
    assert_eq!(rows[1].product, "Porca");
    assert_eq!(rows[1].item_number, "2");
}
