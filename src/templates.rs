//! Project skeleton templates for `ciqx init`.

use crate::config::AppType;

/// Devices listed in a freshly generated manifest
pub const DEFAULT_PRODUCTS: &[&str] = &["fenix7", "venu2", "vivoactive4"];

pub fn manifest(app_type: AppType, app_id: &str, products: &[&str]) -> String {
    let products: String = products
        .iter()
        .map(|p| format!("            <iq:product id=\"{}\"/>\n", p))
        .collect();

    format!(
        r#"<iq:manifest xmlns:iq="http://www.garmin.com/xml/connectiq" version="3">
    <iq:application entry="{entry}" id="{id}" launcherIcon="@Drawables.LauncherIcon" name="@Strings.AppName" type="{kind}" version="1.0.0">
        <iq:products>
{products}        </iq:products>
        <iq:permissions/>
        <iq:languages>
            <iq:language>eng</iq:language>
        </iq:languages>
    </iq:application>
</iq:manifest>
"#,
        entry = app_type.entry_class(),
        id = app_id,
        kind = app_type.as_str(),
        products = products,
    )
}

pub fn strings(app_name: &str) -> String {
    format!(
        r#"<strings>
    <string id="AppName">{}</string>
</strings>
"#,
        app_name
    )
}
