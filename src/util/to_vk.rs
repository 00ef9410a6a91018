//! Utility traits to convert render pass description objects into their corresponding vulkan types

/// Convert an object into a vulkan type
pub trait IntoVulkanType {
    /// Output Vulkan type
    type Output;

    /// Consume self and return a vulkan type
    fn into_vulkan(self) -> Self::Output;
}
