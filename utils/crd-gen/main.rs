use color_eyre::Result;
use device_controller::api::{Device, DeviceProfile, DeviceService};
use kube::CustomResourceExt;

/// Print the CustomResourceDefinitions of the controller as one YAML stream,
/// ready for `kubectl apply -f -`.
fn main() -> Result<()> {
    color_eyre::install()?;
    let crds = [Device::crd(), DeviceProfile::crd(), DeviceService::crd()];
    let docs = crds
        .iter()
        .map(serde_yaml::to_string)
        .collect::<Result<Vec<_>, _>>()?;
    // serde_yaml 0.8 starts every document with its own `---` marker.
    print!("{}", docs.concat());
    Ok(())
}
