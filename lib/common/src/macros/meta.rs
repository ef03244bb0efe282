/// Repeat the [item](https://doc.rust-lang.org/nightly/reference/items.html) `$imp` once per type
/// `$T`, each time with `$Alias` naming that type.
///
/// Prefer a generic impl where one is possible.
#[macro_export]
macro_rules! item_with {
    {$Alias:ident: $($T:ty),+ => $imp:item} => {
        $(
            const _: () = {
                type $Alias = $T;
                $imp
            };
        )+
    };
}
